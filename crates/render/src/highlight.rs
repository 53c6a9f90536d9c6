//! Syntax highlighting engines and language detection.
//!
//! Code blocks arrive with a free-form language hint (fence info string,
//! `language-xxx` class, or just a filename). [`detect_language`] normalizes
//! the hint through an alias table; [`SyntectEngine`] tokenizes through
//! process-wide syntax/theme registries initialized on first use and never
//! mutated after.

use std::collections::HashMap;
use std::sync::OnceLock;

use once_cell::sync::Lazy;
use prosa_core::{HighlightLineSet, PipelineError};
use regex::Regex;
use syntect::highlighting::Theme;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;
use two_face::theme::{EmbeddedLazyThemeSet, EmbeddedThemeName};

/// Alias table for author-facing language names. Identity mappings are
/// omitted; unknown names pass through unchanged.
static LANGUAGE_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("js", "javascript"),
        ("ts", "typescript"),
        ("py", "python"),
        ("rb", "ruby"),
        ("md", "markdown"),
        ("yml", "yaml"),
        ("sh", "bash"),
        ("shell", "bash"),
        ("zsh", "bash"),
        ("console", "bash"),
        ("terminal", "bash"),
        ("cs", "csharp"),
        ("razor", "csharp"),
        ("svg", "xml"),
    ])
});

static LANGUAGE_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"language-(\w+)").expect("language class pattern"));

/// Normalizes one language name: lowercased, backticks and whitespace
/// stripped, alias-resolved.
fn normalize_language(raw: &str) -> String {
    let cleaned: String = raw
        .to_lowercase()
        .chars()
        .filter(|c| *c != '`' && !c.is_whitespace())
        .collect();
    match LANGUAGE_ALIASES.get(cleaned.as_str()) {
        Some(alias) => (*alias).to_string(),
        None => cleaned,
    }
}

/// Detects the language for a code block.
///
/// Priority: explicit hint, then a `language-xxx` CSS class, then the
/// filename extension (alias table only). Falls back to `text`.
pub fn detect_language(
    language: Option<&str>,
    class_name: Option<&str>,
    filename: Option<&str>,
) -> String {
    if let Some(lang) = language
        && !lang.trim().is_empty()
    {
        return normalize_language(lang);
    }

    if let Some(class) = class_name
        && let Some(caps) = LANGUAGE_CLASS.captures(class)
    {
        return normalize_language(&caps[1]);
    }

    if let Some(name) = filename
        && let Some(ext) = name.rsplit('.').next()
        && name.contains('.')
        && let Some(alias) = LANGUAGE_ALIASES.get(ext.to_lowercase().as_str())
    {
        return (*alias).to_string();
    }

    "text".to_string()
}

/// Drops a redundant leading fence line (and its closing line) from code
/// text that was stored with the markers still attached.
pub fn strip_redundant_fence(code: &str) -> String {
    if !code.starts_with("```") {
        return code.to_string();
    }
    let mut lines: Vec<&str> = code.lines().collect();
    if lines
        .first()
        .is_some_and(|first| first.len() > 3 && first[3..].chars().all(|c| c.is_alphanumeric()))
    {
        lines.remove(0);
        if lines.last().is_some_and(|last| last.trim() == "```") {
            lines.pop();
        }
        return lines.join("\n");
    }
    code.to_string()
}

/// A tokenizer that turns code text into highlighted HTML.
pub trait HighlightEngine {
    /// Highlights `code` as `language`, returning a full `<pre>` block.
    fn highlight(&self, code: &str, language: &str) -> Result<String, PipelineError>;
}

/// Syntect-backed engine over the two-face extended syntax set and the
/// Dracula theme.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntectEngine;

impl SyntectEngine {
    fn syntax_set() -> &'static SyntaxSet {
        static SYNTAX_SET: OnceLock<SyntaxSet> = OnceLock::new();
        SYNTAX_SET.get_or_init(two_face::syntax::extra_newlines)
    }

    fn theme() -> &'static Theme {
        static THEME_SET: OnceLock<EmbeddedLazyThemeSet> = OnceLock::new();
        THEME_SET
            .get_or_init(two_face::theme::extra)
            .get(EmbeddedThemeName::Dracula)
    }
}

impl HighlightEngine for SyntectEngine {
    fn highlight(&self, code: &str, language: &str) -> Result<String, PipelineError> {
        let set = Self::syntax_set();
        let syntax = if language == "text" || language.is_empty() {
            set.find_syntax_plain_text()
        } else {
            set.find_syntax_by_token(language)
                .ok_or_else(|| PipelineError::Highlight(format!("unknown language '{language}'")))?
        };

        let html = highlighted_html_for_string(code, set, syntax, Self::theme())
            .map_err(|err| PipelineError::Highlight(err.to_string()))?;

        // Tag the root element so stylesheets can target the language.
        Ok(html.replacen(
            "<pre ",
            &format!(
                "<pre class=\"language-{}\" ",
                html_escape::encode_double_quoted_attribute(language)
            ),
            1,
        ))
    }
}

/// Emits per-line `<div>` wrappers with an emphasis class on member lines.
///
/// Used instead of tokenization when a highlight line set is supplied. Works
/// for any language, including ones no syntax definition covers.
pub fn render_line_emphasis(code: &str, language: &str, lines: &HighlightLineSet) -> String {
    let mut out = format!(
        "<pre class=\"language-{}\"><code>",
        html_escape::encode_double_quoted_attribute(language)
    );
    for (idx, line) in code.lines().enumerate() {
        let class = if lines.contains(idx + 1) {
            "line line-highlighted"
        } else {
            "line"
        };
        out.push_str("<div class=\"");
        out.push_str(class);
        out.push_str("\">");
        out.push_str(&html_escape::encode_text(line));
        out.push_str("</div>");
    }
    out.push_str("</code></pre>");
    out
}

/// Plain escaped fallback when highlighting fails. The language label is
/// kept exactly as the author entered it.
pub fn render_plain_fallback(code: &str, language_label: &str) -> String {
    let label = if language_label.is_empty() {
        "text"
    } else {
        language_label
    };
    format!(
        "<pre class=\"language-{}\"><code>{}</code></pre>",
        html_escape::encode_double_quoted_attribute(label),
        html_escape::encode_text(code)
    )
}

/// Highlighting progress for one code block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HighlightState {
    /// Work has started but no result has landed yet.
    #[default]
    Pending,
    /// Highlighted HTML is ready.
    Highlighted(String),
    /// The engine failed; the fallback rendering applies. No retry.
    Failed,
}

/// A ticket tying a highlight result to the render pass that requested it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightTicket(u64);

/// Per-block holder that discards results from superseded render passes.
///
/// A re-render calls [`begin`] again, invalidating any ticket still held by
/// the previous pass; a [`commit`] with a stale ticket is a no-op, so an
/// older result can never overwrite a newer one.
///
/// [`begin`]: HighlightCell::begin
/// [`commit`]: HighlightCell::commit
#[derive(Debug, Default)]
pub struct HighlightCell {
    generation: u64,
    state: HighlightState,
}

impl HighlightCell {
    /// Create a cell in the pending state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new highlight pass, resetting state and invalidating any
    /// outstanding ticket.
    pub fn begin(&mut self) -> HighlightTicket {
        self.generation += 1;
        self.state = HighlightState::Pending;
        HighlightTicket(self.generation)
    }

    /// Store a result if the ticket is still current. Returns whether the
    /// result was accepted.
    pub fn commit(&mut self, ticket: HighlightTicket, state: HighlightState) -> bool {
        if ticket.0 == self.generation {
            self.state = state;
            true
        } else {
            log::debug!("discarding stale highlight result (ticket {})", ticket.0);
            false
        }
    }

    /// The current state.
    pub fn state(&self) -> &HighlightState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_prefers_explicit_hint() {
        assert_eq!(detect_language(Some("ts"), Some("language-py"), None), "typescript");
    }

    #[test]
    fn detect_resolves_aliases() {
        assert_eq!(detect_language(Some("js"), None, None), "javascript");
        assert_eq!(detect_language(Some("zsh"), None, None), "bash");
        assert_eq!(detect_language(Some("razor"), None, None), "csharp");
        assert_eq!(detect_language(Some("rust"), None, None), "rust");
    }

    #[test]
    fn detect_cleans_backticks_and_whitespace() {
        assert_eq!(detect_language(Some("` TS `"), None, None), "typescript");
    }

    #[test]
    fn detect_reads_language_class() {
        assert_eq!(detect_language(None, Some("language-yml"), None), "yaml");
    }

    #[test]
    fn detect_falls_back_to_filename_extension() {
        assert_eq!(detect_language(None, None, Some("script.py")), "python");
        // Extensions outside the alias table fall through to the default.
        assert_eq!(detect_language(None, None, Some("notes.xyz")), "text");
    }

    #[test]
    fn detect_defaults_to_text() {
        assert_eq!(detect_language(None, None, None), "text");
        assert_eq!(detect_language(Some("  "), None, None), "text");
    }

    #[test]
    fn strips_attached_fence_markers() {
        assert_eq!(strip_redundant_fence("```js\nlet x = 1\n```"), "let x = 1");
        assert_eq!(strip_redundant_fence("let x = 1"), "let x = 1");
        // A bare opening fence with no info string is real content.
        assert_eq!(strip_redundant_fence("```\ntext\n```"), "```\ntext\n```");
    }

    #[test]
    fn syntect_engine_highlights_known_language() {
        let html = SyntectEngine.highlight("let x = 1;", "javascript").unwrap();
        assert!(html.starts_with("<pre class=\"language-javascript\" "));
        assert!(html.contains("</pre>"));
    }

    #[test]
    fn syntect_engine_rejects_unknown_language() {
        let err = SyntectEngine.highlight("x", "not-a-language").unwrap_err();
        assert!(matches!(err, PipelineError::Highlight(_)));
    }

    #[test]
    fn syntect_engine_accepts_plain_text() {
        let html = SyntectEngine.highlight("anything", "text").unwrap();
        assert!(html.starts_with("<pre class=\"language-text\" "));
    }

    #[test]
    fn line_emphasis_marks_member_lines() {
        let set = HighlightLineSet::from_spec("2");
        let html = render_line_emphasis("a\nb\nc", "fakelang", &set);
        assert_eq!(html.matches("<div class=\"line\">").count(), 2);
        assert_eq!(html.matches("<div class=\"line line-highlighted\">").count(), 1);
        assert!(html.contains("class=\"language-fakelang\""));
    }

    #[test]
    fn plain_fallback_escapes_and_keeps_label() {
        let html = render_plain_fallback("<b>&</b>", "brainfudge");
        assert!(html.contains("language-brainfudge"));
        assert!(html.contains("&lt;b&gt;&amp;&lt;/b&gt;"));
    }

    #[test]
    fn stale_highlight_commit_is_discarded() {
        let mut cell = HighlightCell::new();
        let first = cell.begin();
        let second = cell.begin();

        // The slower first pass finishes after a re-render started.
        assert!(!cell.commit(first, HighlightState::Highlighted("old".into())));
        assert_eq!(cell.state(), &HighlightState::Pending);

        assert!(cell.commit(second, HighlightState::Highlighted("new".into())));
        assert_eq!(
            cell.state(),
            &HighlightState::Highlighted("new".to_string())
        );
    }

    #[test]
    fn failed_state_is_terminal_for_the_pass() {
        let mut cell = HighlightCell::new();
        let ticket = cell.begin();
        assert!(cell.commit(ticket, HighlightState::Failed));
        assert_eq!(cell.state(), &HighlightState::Failed);
        // Committing again with the same ticket is still the same pass.
        assert!(cell.commit(ticket, HighlightState::Failed));
    }
}
