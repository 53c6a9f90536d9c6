//! Image reference resolution against a filename/URL map.
//!
//! Content authored with imported image bindings references images three
//! ways: `__IMAGE_<base>__` placeholder tokens (produced by the normalizer),
//! `<Image src={binding}>` invocations, and the `import` lines that once
//! backed those bindings. The resolver substitutes all three using a
//! per-render map of filenames to served URLs.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use prosa_core::{RenderDiagnostics, RenderWarning};
use regex::Regex;

/// Read-only mapping from image filename to its served URL.
#[derive(Debug, Clone, Default)]
pub struct ImageReferenceMap {
    entries: BTreeMap<String, String>,
}

impl ImageReferenceMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filename/URL pair.
    pub fn insert(&mut self, filename: impl Into<String>, url: impl Into<String>) {
        self.entries.insert(filename.into(), url.into());
    }

    /// Look up a URL by exact filename.
    pub fn url_for(&self, filename: &str) -> Option<&str> {
        self.entries.get(filename).map(String::as_str)
    }

    /// Look up the (filename, URL) pair whose extension-less base matches.
    ///
    /// `hero` matches an entry stored as `hero.png`.
    pub fn entry_for_base(&self, base: &str) -> Option<(&str, &str)> {
        self.entries
            .iter()
            .find(|(filename, _)| base_of(filename) == base)
            .map(|(filename, url)| (filename.as_str(), url.as_str()))
    }

    /// True when no images are mapped.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of mapped images.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate over (filename, URL) pairs in filename order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ImageReferenceMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

fn base_of(filename: &str) -> &str {
    filename.split('.').next().unwrap_or(filename)
}

static LEFTOVER_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"__IMAGE_(\w+)__").expect("leftover placeholder pattern"));

/// Substitutes all image references in content using the map.
///
/// Per (filename, URL) entry, in order: `<Image>` invocations bound to the
/// entry's base become markdown image syntax, placeholder tokens become the
/// URL, and the now-dead `import` line becomes a comment noting the
/// substitution. One bad entry logs and is skipped; remaining entries still
/// apply. Placeholders left over after all entries are reported as
/// unresolvable. Idempotent on fully-resolved text.
pub fn resolve_image_references(
    content: &str,
    images: &ImageReferenceMap,
    diagnostics: &mut RenderDiagnostics,
) -> String {
    let mut text = content.to_string();

    for (filename, url) in images.iter() {
        match substitute_entry(&text, filename, url) {
            Ok(next) => text = next,
            Err(err) => {
                log::warn!("skipping image mapping '{filename}': {err}");
            }
        }
    }

    for caps in LEFTOVER_PLACEHOLDER.captures_iter(&text) {
        diagnostics.push(RenderWarning::UnresolvableImageReference {
            filename: caps[1].to_string(),
        });
    }

    text
}

fn substitute_entry(text: &str, filename: &str, url: &str) -> Result<String, regex::Error> {
    let base = base_of(filename);
    let escaped_base = regex::escape(base);

    // <Image> invocations still bound to this base, whether as an expression
    // or an already-placeholdered string, become plain markdown images.
    let image_tag = Regex::new(&format!(
        r#"<Image[^>]*?src=(?:\{{\s*{escaped_base}\s*\}}|"__IMAGE_{escaped_base}__")[^>]*?/?>"#
    ))?;
    let text = image_tag.replace_all(text, format!("![{filename}]({url})"));

    // Placeholder tokens elsewhere (e.g. inside markdown image syntax).
    let text = text.replace(&format!("__IMAGE_{base}__"), url);

    // The import line is dead once the binding is substituted; keep a trace.
    let import_line = Regex::new(&format!(r"(?m)^import\s+{escaped_base}\s+from\s+[^\n]*$"))?;
    let text = import_line.replace_all(
        &text,
        format!("{{/* Image: {filename} imported from {url} */}}"),
    );

    Ok(text.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> ImageReferenceMap {
        [("hero.png", "https://cdn.example.com/hero.png")]
            .into_iter()
            .collect()
    }

    #[test]
    fn replaces_placeholder_tokens() {
        let mut diags = RenderDiagnostics::new();
        let out = resolve_image_references("![hero](__IMAGE_hero__)", &map(), &mut diags);
        assert_eq!(out, "![hero](https://cdn.example.com/hero.png)");
        assert!(!diags.has_warnings());
    }

    #[test]
    fn rewrites_image_tags_with_binding_expression() {
        let mut diags = RenderDiagnostics::new();
        let out = resolve_image_references("<Image src={hero} alt=\"x\" />", &map(), &mut diags);
        assert_eq!(out, "![hero.png](https://cdn.example.com/hero.png)");
    }

    #[test]
    fn rewrites_image_tags_with_placeholder_src() {
        let mut diags = RenderDiagnostics::new();
        let out =
            resolve_image_references("<Image src=\"__IMAGE_hero__\" alt=\"x\">", &map(), &mut diags);
        assert_eq!(out, "![hero.png](https://cdn.example.com/hero.png)");
    }

    #[test]
    fn replaces_import_line_with_comment() {
        let mut diags = RenderDiagnostics::new();
        let input = "import hero from './hero.png'\n\n![hero](__IMAGE_hero__)";
        let out = resolve_image_references(input, &map(), &mut diags);
        assert!(out.starts_with(
            "{/* Image: hero.png imported from https://cdn.example.com/hero.png */}"
        ));
        assert!(out.ends_with("![hero](https://cdn.example.com/hero.png)"));
    }

    #[test]
    fn leftover_placeholders_are_reported() {
        let mut diags = RenderDiagnostics::new();
        let out = resolve_image_references("![x](__IMAGE_ghost__)", &map(), &mut diags);
        assert_eq!(out, "![x](__IMAGE_ghost__)");
        assert_eq!(
            diags.warnings,
            vec![RenderWarning::UnresolvableImageReference {
                filename: "ghost".to_string()
            }]
        );
    }

    #[test]
    fn resolution_is_idempotent_on_resolved_text() {
        let mut diags = RenderDiagnostics::new();
        let once = resolve_image_references("<Image src={hero} />", &map(), &mut diags);
        let twice = resolve_image_references(&once, &map(), &mut diags);
        assert_eq!(once, twice);
        assert!(!diags.has_warnings());
    }

    #[test]
    fn base_lookup_matches_extensionless_binding() {
        let images = map();
        let (filename, url) = images.entry_for_base("hero").expect("base should match");
        assert_eq!(filename, "hero.png");
        assert_eq!(url, "https://cdn.example.com/hero.png");
        assert!(images.entry_for_base("villain").is_none());
    }
}
