//! The markdown-to-HTML renderer and full article pipeline.
//!
//! # Module Structure
//!
//! - `context` - Rendering context for tracking state during traversal
//! - `render` - AST node rendering functions

mod context;
pub mod render;

pub use context::Context;

use prosa_core::{
    Frontmatter, PipelineError, RenderDiagnostics, RenderWarning, scrub_residual_frontmatter,
    split_frontmatter, strip_module_statements,
};
use render::render_node;

use crate::highlight::HighlightEngine;
use crate::images::{ImageReferenceMap, resolve_image_references};
use crate::normalize::normalize_content;

/// The block element currently being rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Document root.
    Root,
    /// Inside a `<p>`.
    Paragraph,
    /// Inside a `<ul>` or `<ol>`.
    List {
        /// Whether the list is loose (items separated by blank lines).
        spread: bool,
    },
    /// Inside a `<table>`.
    Table,
    /// Inside a `<tr>`.
    TableRow,
    /// Inside a `<td>` or `<th>`.
    TableCell,
}

/// Rendering options for one article.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RenderOptions {
    /// When set, a failed render carries the raw stored content for
    /// inspection. Off in production.
    #[serde(default)]
    pub debug: bool,
    /// Whether raw HTML nodes pass through unescaped. Stored content is
    /// trusted authored text, so this defaults to on.
    #[serde(default = "default_allow_raw_html")]
    pub allow_raw_html: bool,
}

fn default_allow_raw_html() -> bool {
    true
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            debug: false,
            allow_raw_html: default_allow_raw_html(),
        }
    }
}

/// Outcome of rendering one article.
#[derive(Debug)]
pub enum RenderOutcome {
    /// The article rendered; recovered failures, if any, are in the
    /// diagnostics.
    Rendered {
        /// Final HTML.
        html: String,
        /// Parsed frontmatter header, when one was present.
        frontmatter: Option<Frontmatter>,
        /// Locally-recovered failures.
        diagnostics: RenderDiagnostics,
    },
    /// The markdown engine could not build a tree; nothing was rendered.
    Failed {
        /// Human-readable failure description.
        message: String,
        /// The raw stored content, present only when `debug` is set.
        raw_content: Option<String>,
        /// Diagnostics gathered before the failure.
        diagnostics: RenderDiagnostics,
    },
}

fn parse_options(options: &RenderOptions) -> markdown::ParseOptions {
    markdown::ParseOptions {
        constructs: markdown::Constructs {
            // Indented content inside components reads as prose, not code.
            code_indented: false,
            mdx_jsx_flow: true,
            mdx_jsx_text: true,
            // Comments left by the image resolver parse as expressions.
            mdx_expression_flow: true,
            mdx_expression_text: true,
            html_flow: options.allow_raw_html,
            html_text: options.allow_raw_html,
            // Residual frontmatter becomes a Yaml node instead of leaking
            // into the output as text.
            frontmatter: true,
            gfm_autolink_literal: true,
            gfm_strikethrough: true,
            gfm_table: true,
            gfm_task_list_item: true,
            ..markdown::Constructs::default()
        },
        ..markdown::ParseOptions::default()
    }
}

/// Renders one stored article to HTML (entry point).
///
/// Pipeline: split frontmatter, scrub residual header lines, normalize
/// legacy conventions, resolve image references, strip remaining module
/// statements, parse, render. Every stage before the parse recovers locally
/// and records diagnostics; only a parse failure aborts.
pub fn render_article(
    content: &str,
    images: &ImageReferenceMap,
    engine: &dyn HighlightEngine,
    options: &RenderOptions,
) -> RenderOutcome {
    let mut diagnostics = RenderDiagnostics::new();

    let split = split_frontmatter(content);
    if split.malformed {
        diagnostics.push(RenderWarning::MalformedFrontmatter);
    }

    let body = scrub_residual_frontmatter(&split.body);
    let normalized = normalize_content(&body, &mut diagnostics);
    let resolved = resolve_image_references(&normalized, images, &mut diagnostics);

    // Image imports with a mapping became comments during resolution; what
    // remains is dead module syntax the markdown engine must not see.
    let stripped = strip_module_statements(&resolved);
    for statement in &stripped.statements {
        log::debug!("dropped module statement: {statement}");
    }

    let tree = match markdown::to_mdast(&stripped.body, &parse_options(options)) {
        Ok(tree) => tree,
        Err(err) => {
            let error = PipelineError::parse(err.to_string(), 1, 1);
            log::error!("{error}");
            return RenderOutcome::Failed {
                message: error.to_string(),
                raw_content: options.debug.then(|| content.to_string()),
                diagnostics,
            };
        }
    };

    let mut ctx = Context::new(images, engine, diagnostics, options.allow_raw_html);
    render_node(&tree, &mut ctx);
    let (html, diagnostics) = ctx.finish();

    RenderOutcome::Rendered {
        html,
        frontmatter: split.frontmatter,
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::SyntectEngine;

    fn render(content: &str) -> RenderOutcome {
        render_article(
            content,
            &ImageReferenceMap::new(),
            &SyntectEngine,
            &RenderOptions::default(),
        )
    }

    fn rendered_html(outcome: RenderOutcome) -> (String, RenderDiagnostics) {
        match outcome {
            RenderOutcome::Rendered {
                html, diagnostics, ..
            } => (html, diagnostics),
            RenderOutcome::Failed { message, .. } => panic!("render failed: {message}"),
        }
    }

    #[test]
    fn renders_basic_markdown() {
        let (html, diags) = rendered_html(render("# Title\n\nA *styled* paragraph.\n\n- one\n- two"));
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<p>A <em>styled</em> paragraph.</p>"));
        assert!(html.contains("<ul><li>one</li><li>two</li></ul>"));
        assert!(!diags.has_warnings());
    }

    #[test]
    fn frontmatter_is_extracted_and_kept_out_of_html() {
        let outcome = render("---\ntitle: \"Hi\"\n---\n\nHello");
        let RenderOutcome::Rendered {
            html, frontmatter, ..
        } = outcome
        else {
            panic!("expected rendered outcome");
        };
        assert_eq!(frontmatter.unwrap().title.as_deref(), Some("Hi"));
        assert!(html.contains("<p>Hello</p>"));
        assert!(!html.contains("title:"));
        assert!(!html.contains("---"));
    }

    #[test]
    fn unclosed_frontmatter_recovers_with_warning() {
        let (html, diags) = rendered_html(render("---\ntitle: broken\n\nStill here"));
        assert!(html.contains("Still here"));
        assert!(diags.warnings.contains(&RenderWarning::MalformedFrontmatter));
    }

    #[test]
    fn code_fence_is_highlighted_with_language_class() {
        let (html, diags) = rendered_html(render("```js\nlet x = 1;\n```"));
        assert!(html.contains("<pre class=\"language-javascript\" "));
        assert!(!diags.has_warnings());
    }

    #[test]
    fn unknown_language_falls_back_to_plain_text_with_label() {
        let (html, diags) = rendered_html(render("```brainfudge\n+++\n```"));
        assert!(html.contains("<pre class=\"language-brainfudge\"><code>"));
        assert!(diags.warnings.contains(&RenderWarning::HighlightFallback {
            language: "brainfudge".to_string()
        }));
    }

    #[test]
    fn filename_shorthand_produces_code_frame() {
        let (html, _) = rendered_html(render("```ts:util.ts\nconst x = 1;\n```"));
        assert!(html.contains("<figure class=\"code-frame\">"));
        assert!(html.contains("<span class=\"code-frame-filename\">util.ts</span>"));
        assert!(html.contains("<span class=\"code-frame-language\">ts</span>"));
        assert!(html.contains("language-typescript"));
    }

    #[test]
    fn highlight_lines_use_line_emphasis() {
        let (html, _) = rendered_html(render("```js highlight={2}\nlet a = 1;\nlet b = 2;\n```"));
        assert!(html.contains("<div class=\"line\">let a = 1;</div>"));
        assert!(html.contains("<div class=\"line line-highlighted\">let b = 2;</div>"));
    }

    #[test]
    fn image_binding_resolves_through_the_map() {
        let images: ImageReferenceMap =
            [("hero.png", "https://cdn.example.com/hero.png")].into_iter().collect();
        let content = "import hero from './hero.png'\n\n<Image src={hero} alt=\"A hero\" />";
        let outcome = render_article(content, &images, &SyntectEngine, &RenderOptions::default());
        let (html, diags) = rendered_html(outcome);
        assert!(html.contains("<img src=\"https://cdn.example.com/hero.png\" alt=\"hero.png\" />"));
        assert!(!diags.has_warnings());
    }

    #[test]
    fn unmapped_image_renders_visible_placeholder() {
        let (html, diags) = rendered_html(render("![a ghost](ghost.png)"));
        assert!(html.contains("<span class=\"missing-image\">Missing image: a ghost</span>"));
        assert!(diags.warnings.contains(&RenderWarning::UnresolvableImageReference {
            filename: "ghost.png".to_string()
        }));
    }

    #[test]
    fn absolute_image_urls_pass_through() {
        let (html, diags) = rendered_html(render("![logo](/img/logo.svg)"));
        assert!(html.contains("<img src=\"/img/logo.svg\" alt=\"logo\" />"));
        assert!(!diags.has_warnings());
    }

    #[test]
    fn external_markdown_links_open_in_new_tab() {
        let (html, _) = rendered_html(render("[out](https://example.com) and [in](/about)"));
        assert!(html.contains(
            "<a href=\"https://example.com\" target=\"_blank\" rel=\"noopener noreferrer\">out</a>"
        ));
        assert!(html.contains("<a href=\"/about\">in</a>"));
    }

    #[test]
    fn gfm_table_renders_with_alignment() {
        let content = "| Name | Age |\n| :--- | ---: |\n| Ana | 30 |";
        let (html, _) = rendered_html(render(content));
        assert!(html.contains("<table><thead>"));
        assert!(html.contains("<th align=\"left\">Name</th>"));
        assert!(html.contains("<td align=\"right\">30</td>"));
    }

    #[test]
    fn task_list_renders_checkboxes() {
        let (html, _) = rendered_html(render("- [ ] open\n- [x] done"));
        assert!(html.contains("class=\"task-list-item\""));
        assert!(html.contains("<input type=\"checkbox\" disabled/>"));
        assert!(html.contains("<input type=\"checkbox\" disabled checked/>"));
    }

    #[test]
    fn strikethrough_renders_del() {
        let (html, _) = rendered_html(render("This is ~~gone~~."));
        assert!(html.contains("<del>gone</del>"));
    }

    #[test]
    fn module_statements_disappear_from_output() {
        let content = "import Thing from './thing'\n\nexport const x = 1\n\nJust prose.";
        let (html, _) = rendered_html(render(content));
        assert!(html.contains("Just prose."));
        assert!(!html.contains("import Thing"));
        assert!(!html.contains("export const"));
    }

    #[test]
    fn resolver_comment_leaves_no_visible_trace() {
        let images: ImageReferenceMap =
            [("hero.png", "https://cdn.example.com/hero.png")].into_iter().collect();
        let content = "import hero from './hero.png'\n\nText";
        let outcome = render_article(content, &images, &SyntectEngine, &RenderOptions::default());
        let (html, _) = rendered_html(outcome);
        assert!(html.contains("Text"));
        assert!(!html.contains("Image: hero.png imported"));
    }

    #[test]
    fn parse_failure_reports_without_raw_content_by_default() {
        let outcome = render("<Unclosed>");
        let RenderOutcome::Failed {
            message,
            raw_content,
            ..
        } = outcome
        else {
            panic!("expected failed outcome");
        };
        assert!(message.starts_with("Parse error at 1:1:"));
        assert!(raw_content.is_none());
    }

    #[test]
    fn parse_failure_carries_raw_content_in_debug_mode() {
        let options = RenderOptions {
            debug: true,
            ..Default::default()
        };
        let outcome = render_article(
            "<Unclosed>",
            &ImageReferenceMap::new(),
            &SyntectEngine,
            &options,
        );
        let RenderOutcome::Failed { raw_content, .. } = outcome else {
            panic!("expected failed outcome");
        };
        assert_eq!(raw_content.as_deref(), Some("<Unclosed>"));
    }

    #[test]
    fn raw_html_passes_through_by_default() {
        let (html, _) = rendered_html(render("Press <kbd>Ctrl</kbd> now."));
        assert!(html.contains("<kbd>Ctrl</kbd>"));
    }
}
