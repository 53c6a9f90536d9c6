use thiserror::Error;

/// Source location information for error reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// Line number (1-indexed).
    pub line: usize,
    /// Column number (1-indexed).
    pub column: usize,
}

impl SourceLocation {
    /// Create a new source location.
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Errors that can abort a render pass.
///
/// Most failure modes in the pipeline are recovered locally and recorded as
/// [`RenderWarning`]s; only these variants propagate as `Err`.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The markdown engine could not build a node tree.
    #[error("Parse error at {location}: {message}")]
    Parse {
        /// Error message from the markdown engine.
        message: String,
        /// Source location of the failure.
        location: SourceLocation,
    },
    /// The highlighting engine rejected the given language/text.
    #[error("Highlight error: {0}")]
    Highlight(String),
    /// Internal logic error (unexpected state).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Create a parse error with location.
    pub fn parse(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self::Parse {
            message: message.into(),
            location: SourceLocation::new(line, column),
        }
    }
}

/// A failure mode that was recovered from locally during a render pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderWarning {
    /// Opening frontmatter delimiter with no closing delimiter; the whole
    /// text was treated as body.
    MalformedFrontmatter,
    /// A filename referenced in content has no entry in the image map; a
    /// visible placeholder was rendered instead.
    UnresolvableImageReference {
        /// The filename or identifier that could not be resolved.
        filename: String,
    },
    /// An individual normalization rewrite failed; the pre-rewrite text for
    /// that rule was retained.
    NormalizationRuleFailure {
        /// Name of the rewrite rule that failed.
        rule: String,
    },
    /// The highlighter could not tokenize a code block; plain escaped text
    /// was rendered instead.
    HighlightFallback {
        /// The language hint as entered by the author.
        language: String,
    },
}

impl std::fmt::Display for RenderWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderWarning::MalformedFrontmatter => {
                write!(f, "frontmatter opened but never closed; treated as body")
            }
            RenderWarning::UnresolvableImageReference { filename } => {
                write!(f, "no image mapping for '{}'", filename)
            }
            RenderWarning::NormalizationRuleFailure { rule } => {
                write!(f, "normalization rule '{}' failed; original text kept", rule)
            }
            RenderWarning::HighlightFallback { language } => {
                write!(f, "highlighting failed for '{}'; rendered as plain text", language)
            }
        }
    }
}

/// Collection of warnings gathered while rendering one article.
#[derive(Debug, Clone, Default)]
pub struct RenderDiagnostics {
    /// Locally-recovered failures, in the order they occurred.
    pub warnings: Vec<RenderWarning>,
}

impl RenderDiagnostics {
    /// Create a new empty diagnostics collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning.
    pub fn push(&mut self, warning: RenderWarning) {
        self.warnings.push(warning);
    }

    /// Check if any warnings were recorded.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Number of recorded warnings.
    pub fn count(&self) -> usize {
        self.warnings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_displays_line_and_column() {
        let loc = SourceLocation::new(3, 14);
        assert_eq!(loc.to_string(), "3:14");
    }

    #[test]
    fn parse_error_carries_location() {
        let err = PipelineError::parse("bad input", 2, 5);
        assert_eq!(err.to_string(), "Parse error at 2:5: bad input");
    }

    #[test]
    fn diagnostics_collects_in_order() {
        let mut diags = RenderDiagnostics::new();
        assert!(!diags.has_warnings());
        diags.push(RenderWarning::MalformedFrontmatter);
        diags.push(RenderWarning::HighlightFallback {
            language: "brainfudge".into(),
        });
        assert!(diags.has_warnings());
        assert_eq!(diags.count(), 2);
        assert_eq!(diags.warnings[0], RenderWarning::MalformedFrontmatter);
    }
}
