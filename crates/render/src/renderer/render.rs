//! AST node rendering functions.

use markdown::mdast::{AttributeContent, AttributeValue, Node};
use prosa_core::{HighlightLineSet, RenderWarning, parse_metastring};

use super::Scope;
use super::context::Context;
use crate::highlight::{
    HighlightCell, HighlightState, detect_language, render_line_emphasis, render_plain_fallback,
    strip_redundant_fence,
};

/// URL prefixes that mark a link as leaving the site.
const EXTERNAL_PREFIXES: [&str; 4] = ["http://", "https://", "//", "www."];

fn is_external_url(url: &str) -> bool {
    EXTERNAL_PREFIXES.iter().any(|p| url.starts_with(p))
}

/// True for URLs the image resolver should not touch: anything already
/// absolute or site-rooted, as opposed to a bare filename.
fn is_direct_image_url(url: &str) -> bool {
    is_external_url(url) || url.starts_with('/') || url.starts_with("data:")
}

fn render_paragraph(para: &markdown::mdast::Paragraph, ctx: &mut Context) {
    let in_tight_list = ctx.is_in_tight_list();
    if !in_tight_list {
        ctx.push_raw("<p>");
        ctx.enter(Scope::Paragraph);
    }

    for child in &para.children {
        render_node(child, ctx);
    }

    if !in_tight_list {
        ctx.exit();
        ctx.push_raw("</p>");
    }
}

fn render_heading(heading: &markdown::mdast::Heading, ctx: &mut Context) {
    let tag = format!("h{}", heading.depth);
    ctx.push_raw(&format!("<{tag}>"));
    for child in &heading.children {
        render_node(child, ctx);
    }
    ctx.push_raw(&format!("</{tag}>"));
}

fn render_list(list: &markdown::mdast::List, ctx: &mut Context) {
    let tag = if list.ordered { "ol" } else { "ul" };
    ctx.push_raw(&format!("<{tag}>"));
    ctx.enter(Scope::List {
        spread: list.spread,
    });

    for child in &list.children {
        render_node(child, ctx);
    }

    ctx.exit();
    ctx.push_raw(&format!("</{tag}>"));
}

/// Task list items (GFM) get a disabled checkbox; nested block children
/// render after the label so the checkbox row stays phrasing content.
fn render_list_item(item: &markdown::mdast::ListItem, ctx: &mut Context) {
    let class_attr = if item.checked.is_some() {
        " class=\"task-list-item\""
    } else {
        ""
    };
    ctx.push_raw(&format!("<li{class_attr}>"));

    if let Some(checked) = item.checked {
        let checked_str = if checked { " checked" } else { "" };
        ctx.push_raw(&format!(
            "<label><input type=\"checkbox\" disabled{checked_str}/><span>"
        ));

        let mut found_paragraph = false;
        let mut block_children = Vec::new();
        for child in &item.children {
            if found_paragraph {
                block_children.push(child);
            } else {
                render_node(child, ctx);
                if matches!(child, Node::Paragraph(_)) {
                    found_paragraph = true;
                }
            }
        }

        ctx.push_raw("</span></label>");

        for child in block_children {
            render_node(child, ctx);
        }
    } else {
        for child in &item.children {
            render_node(child, ctx);
        }
    }

    ctx.push_raw("</li>");
}

fn render_link(link: &markdown::mdast::Link, ctx: &mut Context) {
    ctx.push_raw(r#"<a href=""#);
    ctx.push_attr_value(&link.url);
    ctx.push_raw(r#"""#);

    if let Some(title) = &link.title {
        ctx.push_raw(r#" title=""#);
        ctx.push_attr_value(title);
        ctx.push_raw(r#"""#);
    }

    if is_external_url(&link.url) {
        ctx.push_raw(r#" target="_blank" rel="noopener noreferrer""#);
    }

    ctx.push_raw(">");

    for child in &link.children {
        render_node(child, ctx);
    }

    ctx.push_raw("</a>");
}

fn render_image(img: &markdown::mdast::Image, ctx: &mut Context) {
    emit_image(img.url.trim(), &img.alt, img.title.as_deref(), ctx);
}

/// Resolves an image source and writes either an `<img>` or a visible
/// placeholder with a diagnostic.
fn emit_image(src: &str, alt: &str, title: Option<&str>, ctx: &mut Context) {
    if src.is_empty() {
        missing_image(alt, ctx);
        return;
    }

    let resolved = if is_direct_image_url(src) {
        Some(src.to_string())
    } else if let Some(url) = ctx.images().url_for(src) {
        Some(url.to_string())
    } else {
        ctx.images()
            .entry_for_base(src)
            .map(|(_, url)| url.to_string())
    };

    let Some(url) = resolved else {
        ctx.warn(RenderWarning::UnresolvableImageReference {
            filename: src.to_string(),
        });
        missing_image(if alt.is_empty() { src } else { alt }, ctx);
        return;
    };

    ctx.push_raw(r#"<img src=""#);
    ctx.push_attr_value(&url);
    ctx.push_raw(r#"" alt=""#);
    ctx.push_attr_value(alt);
    ctx.push_raw(r#"""#);
    if let Some(title) = title {
        ctx.push_raw(r#" title=""#);
        ctx.push_attr_value(title);
        ctx.push_raw(r#"""#);
    }
    ctx.push_raw(" />");
}

/// A broken image renders as something the author can see and fix, rather
/// than a silent hole in the page.
fn missing_image(label: &str, ctx: &mut Context) {
    ctx.push_raw(r#"<span class="missing-image">Missing image: "#);
    ctx.push_text(label);
    ctx.push_raw("</span>");
}

fn render_table_row(
    row: &markdown::mdast::TableRow,
    ctx: &mut Context,
    is_header: bool,
    aligns: &[markdown::mdast::AlignKind],
) {
    ctx.push_raw("<tr>");
    ctx.enter(Scope::TableRow);

    for (i, cell) in row.children.iter().enumerate() {
        if let Node::TableCell(c) = cell {
            let tag = if is_header { "th" } else { "td" };

            let align_attr = match aligns.get(i) {
                Some(markdown::mdast::AlignKind::Left) => " align=\"left\"",
                Some(markdown::mdast::AlignKind::Right) => " align=\"right\"",
                Some(markdown::mdast::AlignKind::Center) => " align=\"center\"",
                _ => "",
            };

            ctx.push_raw(&format!("<{tag}{align_attr}>"));
            ctx.enter(Scope::TableCell);

            for child in &c.children {
                render_node(child, ctx);
            }

            ctx.exit();
            ctx.push_raw(&format!("</{tag}>"));
        }
    }

    ctx.exit();
    ctx.push_raw("</tr>");
}

fn render_table(table: &markdown::mdast::Table, ctx: &mut Context) {
    ctx.enter(Scope::Table);
    ctx.push_raw("<table>");

    ctx.push_raw("<thead>");
    if let Some(Node::TableRow(row)) = table.children.first() {
        render_table_row(row, ctx, true, &table.align);
    }
    ctx.push_raw("</thead>");

    if table.children.len() > 1 {
        ctx.push_raw("<tbody>");
        for row in table.children.iter().skip(1) {
            if let Node::TableRow(r) = row {
                render_table_row(r, ctx, false, &table.align);
            }
        }
        ctx.push_raw("</tbody>");
    }

    ctx.push_raw("</table>");
    ctx.exit();
}

/// Renders a code fence: metastring parsed, language detected, highlighting
/// delegated to the engine with the line-emphasis override and the plain
/// escaped fallback.
fn render_code(code: &markdown::mdast::Code, ctx: &mut Context) {
    let meta = parse_metastring(code.meta.as_deref().unwrap_or(""));
    let raw_label = meta
        .language()
        .map(str::to_string)
        .or_else(|| code.lang.clone())
        .unwrap_or_default();
    let language = detect_language(
        (!raw_label.is_empty()).then_some(raw_label.as_str()),
        None,
        meta.filename(),
    );
    let lines = meta
        .highlight()
        .map(HighlightLineSet::from_spec)
        .unwrap_or_default();
    let text = strip_redundant_fence(&code.value);

    let mut cell = HighlightCell::new();
    let ticket = cell.begin();
    let state = if !lines.is_empty() {
        // Line emphasis takes precedence over tokenization and cannot fail.
        HighlightState::Highlighted(render_line_emphasis(&text, &language, &lines))
    } else {
        match ctx.engine().highlight(&text, &language) {
            Ok(html) => HighlightState::Highlighted(html),
            Err(err) => {
                log::warn!("highlighting failed for '{raw_label}': {err}");
                ctx.warn(RenderWarning::HighlightFallback {
                    language: raw_label.clone(),
                });
                HighlightState::Failed
            }
        }
    };
    cell.commit(ticket, state);

    let body = match cell.state() {
        HighlightState::Highlighted(html) => html.clone(),
        _ => render_plain_fallback(&text, &raw_label),
    };

    if let Some(filename) = meta.filename() {
        let label = if raw_label.is_empty() {
            language.as_str()
        } else {
            raw_label.as_str()
        };
        ctx.push_raw("<figure class=\"code-frame\"><figcaption class=\"code-frame-header\"><span class=\"code-frame-filename\">");
        ctx.push_text(filename);
        ctx.push_raw("</span><span class=\"code-frame-language\">");
        ctx.push_text(label);
        ctx.push_raw("</span></figcaption>");
        ctx.push_raw(&body);
        ctx.push_raw("</figure>");
    } else {
        ctx.push_raw(&body);
    }
}

fn render_html(html: &markdown::mdast::Html, ctx: &mut Context) {
    if ctx.raw_html_allowed() {
        ctx.push_raw(&html.value);
    } else {
        log::debug!("escaping raw HTML node: {}", html.value);
        ctx.push_text(&html.value);
    }
}

/// Looks up a string-valued JSX attribute.
fn literal_attribute<'a>(attributes: &'a [AttributeContent], name: &str) -> Option<&'a str> {
    attributes.iter().find_map(|attr| match attr {
        AttributeContent::Property(prop) if prop.name == name => match &prop.value {
            Some(AttributeValue::Literal(s)) => Some(s.as_str()),
            _ => None,
        },
        _ => None,
    })
}

/// Looks up an expression-valued JSX attribute (e.g. `src={hero}`).
fn expression_attribute<'a>(attributes: &'a [AttributeContent], name: &str) -> Option<&'a str> {
    attributes.iter().find_map(|attr| match attr {
        AttributeContent::Property(prop) if prop.name == name => match &prop.value {
            Some(AttributeValue::Expression(expr)) => Some(expr.value.as_str()),
            _ => None,
        },
        _ => None,
    })
}

/// Renders an `<Image>` component invocation that survived resolution.
fn render_image_component(attributes: &[AttributeContent], ctx: &mut Context) {
    let alt = literal_attribute(attributes, "alt").unwrap_or_default().to_string();
    let title = literal_attribute(attributes, "title").map(str::to_string);

    if let Some(src) = literal_attribute(attributes, "src") {
        emit_image(src.trim(), &alt, title.as_deref(), ctx);
        return;
    }

    // An expression binding survived all the way here: either the resolver
    // had no mapping for it, or the content skipped normalization.
    if let Some(binding) = expression_attribute(attributes, "src") {
        let binding = binding.trim().to_string();
        let resolved = ctx
            .images()
            .entry_for_base(&binding)
            .map(|(_, url)| url.to_string());
        if let Some(url) = resolved {
            emit_image(&url, &alt, title.as_deref(), ctx);
            return;
        }
        ctx.warn(RenderWarning::UnresolvableImageReference {
            filename: binding.clone(),
        });
        missing_image(&binding, ctx);
        return;
    }

    ctx.warn(RenderWarning::UnresolvableImageReference {
        filename: String::new(),
    });
    missing_image(if alt.is_empty() { "(no src)" } else { &alt }, ctx);
}

/// Renders a JSX element. `<Image>` gets dedicated handling; lowercase tags
/// render as plain HTML; unknown capitalized components render their
/// children transparently.
fn render_jsx(
    name: Option<&str>,
    attributes: &[AttributeContent],
    children: &[Node],
    ctx: &mut Context,
) {
    let Some(tag_name) = name else {
        for child in children {
            render_node(child, ctx);
        }
        return;
    };

    if tag_name == "Image" {
        render_image_component(attributes, ctx);
        return;
    }

    if tag_name.starts_with(|c: char| c.is_ascii_lowercase()) {
        ctx.push_raw("<");
        ctx.push_raw(tag_name);
        for attr in attributes {
            if let AttributeContent::Property(prop) = attr {
                ctx.push_raw(" ");
                ctx.push_raw(&prop.name);
                if let Some(AttributeValue::Literal(value)) = &prop.value {
                    ctx.push_raw("=\"");
                    ctx.push_attr_value(value);
                    ctx.push_raw("\"");
                }
            }
        }
        if children.is_empty() {
            ctx.push_raw(" />");
            return;
        }
        ctx.push_raw(">");
        for child in children {
            render_node(child, ctx);
        }
        ctx.push_raw("</");
        ctx.push_raw(tag_name);
        ctx.push_raw(">");
        return;
    }

    log::debug!("rendering children of unhandled component <{tag_name}>");
    for child in children {
        render_node(child, ctx);
    }
}

fn render_blockquote(quote: &markdown::mdast::Blockquote, ctx: &mut Context) {
    ctx.push_raw("<blockquote>");
    for child in &quote.children {
        render_node(child, ctx);
    }
    ctx.push_raw("</blockquote>");
}

/// Recursively renders an AST node to HTML, updating the context state.
pub fn render_node(node: &Node, ctx: &mut Context) {
    match node {
        Node::Root(root) => {
            for child in &root.children {
                render_node(child, ctx);
            }
        }
        Node::Text(text) => ctx.push_text(&text.value),
        Node::Paragraph(para) => render_paragraph(para, ctx),
        Node::Heading(heading) => render_heading(heading, ctx),
        Node::Link(link) => render_link(link, ctx),
        Node::Strong(strong) => {
            ctx.push_raw("<strong>");
            for child in &strong.children {
                render_node(child, ctx);
            }
            ctx.push_raw("</strong>");
        }
        Node::Emphasis(emphasis) => {
            ctx.push_raw("<em>");
            for child in &emphasis.children {
                render_node(child, ctx);
            }
            ctx.push_raw("</em>");
        }
        Node::Delete(delete) => {
            ctx.push_raw("<del>");
            for child in &delete.children {
                render_node(child, ctx);
            }
            ctx.push_raw("</del>");
        }
        Node::InlineCode(code) => {
            ctx.push_raw("<code>");
            ctx.push_text(&code.value);
            ctx.push_raw("</code>");
        }
        Node::List(list) => render_list(list, ctx),
        Node::ListItem(item) => render_list_item(item, ctx),
        Node::Code(code) => render_code(code, ctx),
        Node::Blockquote(quote) => render_blockquote(quote, ctx),
        Node::Image(img) => render_image(img, ctx),
        Node::Table(table) => render_table(table, ctx),
        Node::TableRow(_) => {}
        Node::TableCell(_) => {}
        Node::ThematicBreak(_) => ctx.push_raw("<hr />"),
        Node::Break(_) => ctx.push_raw("<br />"),
        Node::Html(html) => render_html(html, ctx),
        Node::MdxJsxFlowElement(elem) => {
            render_jsx(elem.name.as_deref(), &elem.attributes, &elem.children, ctx);
        }
        Node::MdxJsxTextElement(elem) => {
            render_jsx(elem.name.as_deref(), &elem.attributes, &elem.children, ctx);
        }
        // Expressions are comments or leftover bindings by this stage.
        Node::MdxFlowExpression(_) | Node::MdxTextExpression(_) => {}
        // Residual frontmatter parsed by the construct; already handled upstream.
        Node::Yaml(_) | Node::Toml(_) => {}
        _ => {
            log::warn!("unhandled markdown node type: {node:?}");
        }
    }
}
