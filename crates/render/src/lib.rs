#![deny(missing_docs)]
//! prosa render: content normalization, image resolution, and HTML rendering.
//!
//! The pipeline takes stored article text plus a resolved image map and
//! produces final HTML. Every stage recovers locally where it can; only a
//! markdown parse failure aborts a render.

/// Syntax highlighting engines and language detection.
pub mod highlight;
/// Image reference resolution against a filename/URL map.
pub mod images;
/// Ordered content normalization rewrites.
pub mod normalize;
/// The markdown-to-HTML renderer and full article pipeline.
pub mod renderer;

pub use highlight::{
    HighlightCell, HighlightEngine, HighlightState, SyntectEngine, detect_language,
};
pub use images::{ImageReferenceMap, resolve_image_references};
pub use normalize::normalize_content;
pub use renderer::{RenderOptions, RenderOutcome, render_article};
