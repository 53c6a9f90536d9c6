//! Code-block metastring parsing.
//!
//! The metastring is the free-form annotation following a fence opener, e.g.
//! `js filename="a.js" highlight={1,3-4}`. Several detection strategies run
//! in order; per key the first strategy to produce a value wins, so explicit
//! `language=`/`filename=` attributes always beat positional inference,
//! which is a best-effort fallback only.

use std::collections::{BTreeMap, BTreeSet, btree_map};

use once_cell::sync::Lazy;
use regex::Regex;

/// Structured metadata parsed from one code-fence annotation line.
///
/// An ordered key/value mapping. Insertion through [`set_if_absent`] never
/// overwrites, giving first-match-wins semantics across detection passes.
///
/// [`set_if_absent`]: CodeBlockMetadata::set_if_absent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeBlockMetadata {
    entries: BTreeMap<String, String>,
}

impl CodeBlockMetadata {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Insert a value, overwriting any previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Insert a value only when the key is not yet present.
    pub fn set_if_absent(&mut self, key: impl Into<String>, value: impl Into<String>) {
        if let btree_map::Entry::Vacant(entry) = self.entries.entry(key.into()) {
            entry.insert(value.into());
        }
    }

    /// The declared language, if any.
    pub fn language(&self) -> Option<&str> {
        self.get("language")
    }

    /// The declared filename, if any.
    pub fn filename(&self) -> Option<&str> {
        self.get("filename")
    }

    /// The raw highlight spec (e.g. `1,3-4`), if any.
    pub fn highlight(&self) -> Option<&str> {
        self.get("highlight")
    }

    /// True when no keys were detected.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of detected keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate over key/value pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(\w+)=(?:"([^"]*)"|'([^']*)'|(\{[^}]*\})|(\S+))"#).expect("attribute pattern")
});

static BARE_FILENAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w./\-]+\.\w+$").expect("bare filename pattern"));

static LANG_FILE_SHORTHAND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w+):(\S+)$").expect("lang:file pattern"));

static HIGHLIGHT_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:highlight=)?\{([\d,\-\s]*)\}").expect("highlight token pattern"));

/// Parses a metastring into structured [`CodeBlockMetadata`].
///
/// An empty or whitespace-only metastring yields an empty mapping, never an
/// error. Parsing is idempotent: the same input always yields the same map.
pub fn parse_metastring(metastring: &str) -> CodeBlockMetadata {
    let mut metadata = CodeBlockMetadata::new();
    let trimmed = metastring.trim();
    if trimmed.is_empty() {
        return metadata;
    }

    // 1. A literal JSON object maps directly to key/value pairs.
    if trimmed.starts_with('{')
        && let Ok(object) = serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(trimmed)
    {
        for (key, value) in object {
            let value = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            metadata.set_if_absent(key, value);
        }
        return metadata;
    }

    // 2. Explicit key=value attributes; this pass may overwrite within itself
    // (last attribute wins) but later passes only fill gaps.
    for caps in ATTRIBUTE.captures_iter(trimmed) {
        let key = &caps[1];
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(5))
            .map(|m| m.as_str().to_string())
            .or_else(|| {
                caps.get(4)
                    .map(|m| m.as_str().trim_matches(['{', '}']).to_string())
            })
            .unwrap_or_default();
        metadata.insert(key, value);
    }

    // 3. The whole string as a bare filename.
    if !trimmed.contains('=') && BARE_FILENAME.is_match(trimmed) {
        metadata.set_if_absent("filename", trimmed);
    }

    // 4. `language:filename` shorthand.
    if let Some(caps) = LANG_FILE_SHORTHAND.captures(trimmed)
        && caps[2].contains('.')
    {
        metadata.set_if_absent("language", &caps[1]);
        metadata.set_if_absent("filename", &caps[2]);
    }

    // 5. A `{...}` token with or without its `highlight=` prefix.
    if let Some(caps) = HIGHLIGHT_TOKEN.captures(trimmed) {
        metadata.set_if_absent("highlight", caps[1].trim());
    }

    // 6/7. Positional fallbacks, documented as best-effort.
    let mut tokens = trimmed.split_whitespace();
    if let Some(first) = tokens.next()
        && !first.contains('=')
        && !first.contains(['"', '\''])
        && !BARE_FILENAME.is_match(first)
        && !first.starts_with('{')
    {
        metadata.set_if_absent("language", first);
    }
    if let Some(second) = tokens.next()
        && second.contains('.')
        && !second.contains('=')
    {
        metadata.set_if_absent("filename", second);
    }

    metadata
}

/// A set of 1-based code line numbers to visually emphasize.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HighlightLineSet {
    lines: BTreeSet<usize>,
}

impl HighlightLineSet {
    /// Expand a spec such as `1,3-5` (optionally brace-wrapped) into a set.
    ///
    /// A token containing `-` denotes an inclusive range. Malformed tokens
    /// (non-numeric, zero, or `start > end`) contribute nothing.
    pub fn from_spec(spec: &str) -> Self {
        let mut lines = BTreeSet::new();
        let cleaned: String = spec.chars().filter(|c| !matches!(c, '{' | '}')).collect();
        for token in cleaned.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            if let Some((start, end)) = token.split_once('-') {
                let (Ok(start), Ok(end)) = (start.trim().parse::<usize>(), end.trim().parse::<usize>())
                else {
                    continue;
                };
                if start >= 1 && start <= end {
                    lines.extend(start..=end);
                }
            } else if let Ok(line) = token.parse::<usize>()
                && line >= 1
            {
                lines.insert(line);
            }
        }
        Self { lines }
    }

    /// True when the 1-based line index is a member.
    pub fn contains(&self, line: usize) -> bool {
        self.lines.contains(&line)
    }

    /// True when no lines are selected.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of selected lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Iterate over selected line numbers in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.lines.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_metastring_yields_empty_map() {
        assert!(parse_metastring("").is_empty());
        assert!(parse_metastring("   \t ").is_empty());
    }

    #[test]
    fn parses_attributes_with_quotes_and_braces() {
        let meta = parse_metastring(r#"js filename="a.js" highlight={1,3-4}"#);
        assert_eq!(meta.language(), Some("js"));
        assert_eq!(meta.filename(), Some("a.js"));
        assert_eq!(meta.highlight(), Some("1,3-4"));
    }

    #[test]
    fn parses_single_quoted_and_bare_attributes() {
        let meta = parse_metastring("filename='b.ts' theme=dark");
        assert_eq!(meta.filename(), Some("b.ts"));
        assert_eq!(meta.get("theme"), Some("dark"));
    }

    #[test]
    fn parses_json_object_form() {
        let meta = parse_metastring(r#"{"language": "rust", "filename": "main.rs"}"#);
        assert_eq!(meta.language(), Some("rust"));
        assert_eq!(meta.filename(), Some("main.rs"));
    }

    #[test]
    fn whole_string_bare_filename() {
        let meta = parse_metastring("src/util.test.ts");
        assert_eq!(meta.filename(), Some("src/util.test.ts"));
        assert_eq!(meta.language(), None);
    }

    #[test]
    fn language_filename_shorthand() {
        let meta = parse_metastring("ts:util.ts");
        assert_eq!(meta.language(), Some("ts"));
        assert_eq!(meta.filename(), Some("util.ts"));
    }

    #[test]
    fn brace_token_without_prefix_becomes_highlight() {
        let meta = parse_metastring("js {2,5-6}");
        assert_eq!(meta.language(), Some("js"));
        assert_eq!(meta.highlight(), Some("2,5-6"));
    }

    #[test]
    fn positional_language_and_filename() {
        let meta = parse_metastring("python script.py");
        assert_eq!(meta.language(), Some("python"));
        assert_eq!(meta.filename(), Some("script.py"));
    }

    #[test]
    fn explicit_keys_beat_positional_inference() {
        let meta = parse_metastring(r#"go language="rust" filename="lib.rs" other.txt"#);
        assert_eq!(meta.language(), Some("rust"));
        assert_eq!(meta.filename(), Some("lib.rs"));
    }

    #[test]
    fn parsing_is_idempotent() {
        let input = r#"ts filename="x.ts" highlight={1} extra=1"#;
        assert_eq!(parse_metastring(input), parse_metastring(input));
    }

    #[test]
    fn arbitrary_keys_pass_through() {
        let meta = parse_metastring(r#"js caption="setup" showLineNumbers=true"#);
        assert_eq!(meta.get("caption"), Some("setup"));
        assert_eq!(meta.get("showLineNumbers"), Some("true"));
    }

    #[test]
    fn line_set_expands_ranges() {
        let set = HighlightLineSet::from_spec("1,3-5");
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![1, 3, 4, 5]);
    }

    #[test]
    fn line_set_single_element_range() {
        let set = HighlightLineSet::from_spec("2-2");
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn line_set_ignores_malformed_tokens() {
        let set = HighlightLineSet::from_spec("5-3,abc,0,2");
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn line_set_accepts_braces_and_spaces() {
        let set = HighlightLineSet::from_spec("{1, 4-6}");
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![1, 4, 5, 6]);
        assert!(set.contains(5));
        assert!(!set.contains(2));
    }

    #[test]
    fn line_set_empty_spec() {
        assert!(HighlightLineSet::from_spec("").is_empty());
        assert!(HighlightLineSet::from_spec("{}").is_empty());
    }
}
