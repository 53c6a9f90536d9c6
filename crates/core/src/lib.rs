#![deny(missing_docs)]
//! prosa core: frontmatter splitting, code-block metastrings, and fence tracking.

/// Core error and diagnostic types.
pub mod error;
/// Fence state tracking and module statement stripping.
pub mod fences;
/// Frontmatter splitting, scrubbing, and composition.
pub mod frontmatter;
/// Code-block metastring parsing and highlight line sets.
pub mod metastring;
/// Content inspection reports for authoring diagnostics.
pub mod report;

pub use error::{PipelineError, RenderDiagnostics, RenderWarning, SourceLocation};
pub use fences::{FencePhase, FenceState, StrippedBody, advance_fence_state, strip_module_statements};
pub use frontmatter::{
    Frontmatter, FrontmatterSplit, compose_frontmatter, scrub_residual_frontmatter,
    split_frontmatter,
};
pub use metastring::{CodeBlockMetadata, HighlightLineSet, parse_metastring};
pub use report::{
    ContentFormat, ContentReport, FrontmatterInfo, ImageRef, ImportDecl, inspect_content,
};
