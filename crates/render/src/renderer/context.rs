//! Rendering context for the markdown renderer.

use prosa_core::{RenderDiagnostics, RenderWarning};

use super::Scope;
use crate::highlight::HighlightEngine;
use crate::images::ImageReferenceMap;

/// Tracks rendering state while traversing the markdown AST: the output
/// buffer, the block scope stack, and the per-render resources the custom
/// node handlers need.
pub struct Context<'a> {
    html: String,
    stack: Vec<Scope>,
    images: &'a ImageReferenceMap,
    engine: &'a dyn HighlightEngine,
    diagnostics: RenderDiagnostics,
    allow_raw_html: bool,
}

impl<'a> Context<'a> {
    /// Creates a context, seeded with diagnostics gathered upstream.
    pub fn new(
        images: &'a ImageReferenceMap,
        engine: &'a dyn HighlightEngine,
        diagnostics: RenderDiagnostics,
        allow_raw_html: bool,
    ) -> Self {
        Self {
            html: String::with_capacity(4096),
            stack: vec![Scope::Root],
            images,
            engine,
            diagnostics,
            allow_raw_html,
        }
    }

    /// Writes a raw string to the output without escaping (for safe tags).
    pub fn push_raw(&mut self, s: &str) {
        self.html.push_str(s);
    }

    /// Writes text content with HTML escaping.
    pub fn push_text(&mut self, s: &str) {
        for c in s.chars() {
            match c {
                '<' => self.html.push_str("&lt;"),
                '>' => self.html.push_str("&gt;"),
                '&' => self.html.push_str("&amp;"),
                _ => self.html.push(c),
            }
        }
    }

    /// Writes an attribute value with quote-safe escaping.
    pub fn push_attr_value(&mut self, s: &str) {
        for c in s.chars() {
            match c {
                '<' => self.html.push_str("&lt;"),
                '>' => self.html.push_str("&gt;"),
                '&' => self.html.push_str("&amp;"),
                '"' => self.html.push_str("&quot;"),
                '\'' => self.html.push_str("&#39;"),
                _ => self.html.push(c),
            }
        }
    }

    /// Enters a new scope.
    pub fn enter(&mut self, scope: Scope) {
        self.stack.push(scope);
    }

    /// Exits the current scope.
    pub fn exit(&mut self) -> Option<Scope> {
        self.stack.pop()
    }

    /// True when inside a tight (non-spread) list, where `<p>` wrappers
    /// around list item content are suppressed.
    pub fn is_in_tight_list(&self) -> bool {
        self.stack
            .iter()
            .rev()
            .find(|scope| matches!(scope, Scope::List { .. }))
            .is_some_and(|scope| matches!(scope, Scope::List { spread: false }))
    }

    /// The per-render image map.
    pub fn images(&self) -> &ImageReferenceMap {
        self.images
    }

    /// The highlighting engine for this render.
    pub fn engine(&self) -> &dyn HighlightEngine {
        self.engine
    }

    /// Whether raw HTML nodes pass through unescaped.
    pub fn raw_html_allowed(&self) -> bool {
        self.allow_raw_html
    }

    /// Records a recovered failure.
    pub fn warn(&mut self, warning: RenderWarning) {
        self.diagnostics.push(warning);
    }

    /// Consumes the context, returning the output and diagnostics.
    pub fn finish(self) -> (String, RenderDiagnostics) {
        (self.html, self.diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::SyntectEngine;

    #[test]
    fn text_escaping_covers_markup_characters() {
        let images = ImageReferenceMap::new();
        let mut ctx = Context::new(&images, &SyntectEngine, RenderDiagnostics::new(), true);
        ctx.push_text("a < b & c > d");
        let (html, _) = ctx.finish();
        assert_eq!(html, "a &lt; b &amp; c &gt; d");
    }

    #[test]
    fn attr_escaping_covers_quotes() {
        let images = ImageReferenceMap::new();
        let mut ctx = Context::new(&images, &SyntectEngine, RenderDiagnostics::new(), true);
        ctx.push_attr_value(r#"say "hi" & 'bye'"#);
        let (html, _) = ctx.finish();
        assert_eq!(html, "say &quot;hi&quot; &amp; &#39;bye&#39;");
    }

    #[test]
    fn tight_list_detection_uses_innermost_list() {
        let images = ImageReferenceMap::new();
        let mut ctx = Context::new(&images, &SyntectEngine, RenderDiagnostics::new(), true);
        assert!(!ctx.is_in_tight_list());
        ctx.enter(Scope::List { spread: true });
        assert!(!ctx.is_in_tight_list());
        ctx.enter(Scope::List { spread: false });
        assert!(ctx.is_in_tight_list());
        ctx.exit();
        assert!(!ctx.is_in_tight_list());
    }
}
