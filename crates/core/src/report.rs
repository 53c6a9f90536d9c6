//! Content inspection reports for authoring diagnostics.
//!
//! [`inspect_content`] examines raw stored content without rendering it and
//! summarizes what a render would have to deal with: header presence, module
//! statements, component usage, fence count, and image references. Useful
//! when a render fails and the question is "what is actually in this text".

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::fences::{FencePhase, FenceState, advance_fence_state};
use crate::frontmatter::split_frontmatter;

/// Content storage format, detected from layout markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentFormat {
    /// Early storage format wrapping the body in a layout component.
    Legacy,
    /// Current format: frontmatter header followed by markdown body.
    Frontmatter,
}

/// Summary of a frontmatter header, as found (or not) in the raw text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FrontmatterInfo {
    /// Whether the text begins with an opening delimiter.
    pub exists: bool,
    /// Detected title, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Detected description, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Detected author, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Detected date, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// A `import Name from 'path'` statement found in the raw text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportDecl {
    /// The imported binding name.
    pub name: String,
    /// The module path it is imported from.
    pub path: String,
}

/// An `<Image ...>` usage found in the raw text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRef {
    /// The `src` attribute value, when one could be extracted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    /// Whether the `src` names an import binding that actually exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_import: Option<bool>,
}

/// Full inspection report for one piece of raw content.
#[derive(Debug, Clone, Serialize)]
pub struct ContentReport {
    /// Total length in characters.
    pub length: usize,
    /// The first 100 characters, with a trailing `...` when truncated, or
    /// `(empty)`.
    pub excerpt: String,
    /// Detected storage format.
    pub format: ContentFormat,
    /// Frontmatter header summary.
    pub frontmatter: FrontmatterInfo,
    /// Module import statements.
    pub imports: Vec<ImportDecl>,
    /// Distinct capitalized component names, in first-seen order.
    pub components: Vec<String>,
    /// Number of fenced code blocks.
    pub code_blocks: usize,
    /// Image component usages.
    pub images: Vec<ImageRef>,
    /// Suspicious findings, in the order they were noticed.
    pub warnings: Vec<String>,
}

static IMPORT_STATEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"import\s+(\w+)\s+from\s+["']([^"']+)["']"#).expect("import pattern")
});

static COMPONENT_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([A-Z]\w*)[^>]*>").expect("component tag pattern"));

static IMAGE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<Image[^>]*>").expect("image tag pattern"));

static SRC_QUOTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"src=["']([^"']+)["']"#).expect("quoted src pattern"));

static SRC_BRACED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"src=\{([^}]+)\}").expect("braced src pattern"));

static BARE_IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w+$").expect("identifier pattern"));

/// Inspects raw content and builds a [`ContentReport`].
///
/// Never fails: anything that cannot be determined is simply absent from the
/// report, with a warning where the absence is itself suspicious.
pub fn inspect_content(content: &str) -> ContentReport {
    let mut warnings = Vec::new();

    let legacy = content.contains("import { ArticleLayout }")
        || content.contains("export default (props) => <ArticleLayout");
    let format = if legacy {
        ContentFormat::Legacy
    } else {
        ContentFormat::Frontmatter
    };

    let frontmatter = inspect_frontmatter(content, &mut warnings);

    if matches!(format, ContentFormat::Frontmatter) && !frontmatter.exists {
        warnings.push("content has no frontmatter header".to_string());
    }

    let imports: Vec<ImportDecl> = IMPORT_STATEMENT
        .captures_iter(content)
        .map(|caps| ImportDecl {
            name: caps[1].to_string(),
            path: caps[2].to_string(),
        })
        .collect();

    let mut components: Vec<String> = Vec::new();
    for caps in COMPONENT_TAG.captures_iter(content) {
        let name = &caps[1];
        if !components.iter().any(|c| c == name) {
            components.push(name.to_string());
        }
    }

    let images: Vec<ImageRef> = IMAGE_TAG
        .find_iter(content)
        .map(|tag| {
            let src = SRC_QUOTED
                .captures(tag.as_str())
                .or_else(|| SRC_BRACED.captures(tag.as_str()))
                .map(|caps| caps[1].trim().to_string());
            let has_import = src
                .as_deref()
                .map(|src| imports.iter().any(|import| import.name == src));
            ImageRef { src, has_import }
        })
        .collect();

    for image in &images {
        if let Some(src) = image.src.as_deref()
            && BARE_IDENT.is_match(src)
            && image.has_import != Some(true)
        {
            warnings.push(format!("image '{src}' is referenced but never imported"));
        }
    }

    check_tag_balance(content, &mut warnings);

    let length = content.chars().count();
    let excerpt = if content.is_empty() {
        "(empty)".to_string()
    } else if length > 100 {
        let head: String = content.chars().take(100).collect();
        format!("{head}...")
    } else {
        content.to_string()
    };

    ContentReport {
        length,
        excerpt,
        format,
        frontmatter,
        imports,
        components,
        code_blocks: count_code_blocks(content),
        images,
        warnings,
    }
}

fn inspect_frontmatter(content: &str, warnings: &mut Vec<String>) -> FrontmatterInfo {
    if !content.starts_with("---") {
        return FrontmatterInfo::default();
    }

    let split = split_frontmatter(content);
    if split.malformed {
        warnings.push("frontmatter opened with '---' but never closed".to_string());
        return FrontmatterInfo {
            exists: true,
            ..Default::default()
        };
    }

    let mut info = FrontmatterInfo {
        exists: true,
        ..Default::default()
    };
    if let Some(fm) = split.frontmatter {
        info.title = fm.title;
        info.description = fm.description;
        info.author = fm.author;
        info.date = fm.date;
    }
    info
}

/// Counts opened code fences via line-wise state tracking, so an unclosed
/// trailing fence still counts as one block.
fn count_code_blocks(content: &str) -> usize {
    let mut state = FenceState::default();
    let mut blocks = 0;
    for line in content.lines() {
        let was_outside = matches!(state.phase, FencePhase::Outside);
        let outcome = advance_fence_state(line, state);
        if was_outside && matches!(outcome.next_state.phase, FencePhase::InsideFence) {
            blocks += 1;
        }
        state = outcome.next_state;
    }
    blocks
}

/// A rough angle-bracket balance check catches truncated component tags.
fn check_tag_balance(content: &str, warnings: &mut Vec<String>) {
    if !content.contains('<') || !content.contains('>') {
        return;
    }
    let opens = content.matches('<').count() as isize;
    let closes = content.matches('>').count() as isize;
    if opens != closes {
        warnings.push(format!(
            "possible unbalanced component tags: {} more '<' than '>'",
            opens - closes
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "---\ntitle: \"Post\"\nauthor: \"Ana\"\n---\n\nimport hero from './hero.png'\n\n<Image src={hero} alt=\"hero\" />\n\n```js\nconsole.log(1)\n```\n";

    #[test]
    fn reports_frontmatter_fields() {
        let report = inspect_content(SAMPLE);
        assert!(report.frontmatter.exists);
        assert_eq!(report.frontmatter.title.as_deref(), Some("Post"));
        assert_eq!(report.frontmatter.author.as_deref(), Some("Ana"));
        assert_eq!(report.format, ContentFormat::Frontmatter);
    }

    #[test]
    fn reports_imports_and_resolved_images() {
        let report = inspect_content(SAMPLE);
        assert_eq!(report.imports.len(), 1);
        assert_eq!(report.imports[0].name, "hero");
        assert_eq!(report.imports[0].path, "./hero.png");
        assert_eq!(report.images.len(), 1);
        assert_eq!(report.images[0].src.as_deref(), Some("hero"));
        assert_eq!(report.images[0].has_import, Some(true));
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn warns_on_unimported_image() {
        let report = inspect_content("---\ntitle: \"X\"\n---\n<Image src={ghost} alt=\"\" />");
        assert_eq!(report.images[0].has_import, Some(false));
        assert!(
            report
                .warnings
                .iter()
                .any(|w| w.contains("'ghost'") && w.contains("never imported"))
        );
    }

    #[test]
    fn counts_code_blocks_including_unclosed() {
        let report = inspect_content("```js\na\n```\n\n```py\nb\n");
        assert_eq!(report.code_blocks, 2);
    }

    #[test]
    fn detects_legacy_format() {
        let report = inspect_content("import { ArticleLayout } from '@/components'\n\nBody");
        assert_eq!(report.format, ContentFormat::Legacy);
    }

    #[test]
    fn warns_on_unclosed_frontmatter() {
        let report = inspect_content("---\ntitle: broken");
        assert!(report.frontmatter.exists);
        assert!(report.frontmatter.title.is_none());
        assert!(report.warnings.iter().any(|w| w.contains("never closed")));
    }

    #[test]
    fn empty_content_reports_placeholder_excerpt() {
        let report = inspect_content("");
        assert_eq!(report.length, 0);
        assert_eq!(report.excerpt, "(empty)");
        assert_eq!(report.code_blocks, 0);
    }

    #[test]
    fn excerpt_marks_truncation_only_when_truncated() {
        let short = inspect_content("Short body");
        assert_eq!(short.excerpt, "Short body");

        let long_text = "x".repeat(150);
        let long = inspect_content(&long_text);
        assert!(long.excerpt.ends_with("..."));
        assert_eq!(long.excerpt.chars().count(), 103);
    }

    #[test]
    fn collects_distinct_components_in_order() {
        let report =
            inspect_content("---\nt: x\n---\n<Callout a=1>\n<Image src=\"a.png\" />\n<Callout>");
        assert_eq!(report.components, vec!["Callout", "Image"]);
    }

    #[test]
    fn serializes_to_json() {
        let report = inspect_content(SAMPLE);
        let json = serde_json::to_value(&report).expect("report serializes");
        assert_eq!(json["format"], "frontmatter");
        assert_eq!(json["frontmatter"]["title"], "Post");
        assert_eq!(json["code_blocks"], 1);
    }
}
