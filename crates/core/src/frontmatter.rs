//! Frontmatter splitting, residual scrubbing, and composition.
//!
//! Stored article content optionally begins with a `---` delimited header
//! carrying title/description/author/date metadata. Splitting is lenient:
//! a header that cannot be parsed never aborts a render.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

/// The three-character header delimiter.
const DELIMITER: &str = "---";

/// Frontmatter keys recognized when scrubbing residual header lines.
const KNOWN_KEYS: [&str; 5] = ["title", "description", "author", "date", "slug"];

/// Parsed frontmatter fields for one article.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frontmatter {
    /// Article title.
    pub title: Option<String>,
    /// Article description.
    pub description: Option<String>,
    /// Author name.
    pub author: Option<String>,
    /// Publication date, kept as the stored string.
    pub date: Option<String>,
    /// Any other scalar fields found in the header.
    pub extra: BTreeMap<String, String>,
}

impl Frontmatter {
    fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.author.is_none()
            && self.date.is_none()
            && self.extra.is_empty()
    }

    fn set(&mut self, key: &str, value: String) {
        match key {
            "title" => self.title = Some(value),
            "description" => self.description = Some(value),
            "author" => self.author = Some(value),
            "date" => self.date = Some(value),
            _ => {
                self.extra.insert(key.to_string(), value);
            }
        }
    }
}

/// Result of splitting raw content into frontmatter and body.
#[derive(Debug, Clone, Default)]
pub struct FrontmatterSplit {
    /// Parsed header, if one was present and non-empty.
    pub frontmatter: Option<Frontmatter>,
    /// Body text with the header removed and trimmed.
    pub body: String,
    /// True when an opening delimiter had no closing delimiter.
    pub malformed: bool,
}

/// Splits raw content text into an optional frontmatter header and a body.
///
/// If the text starts with `---`, the next `---` closes the header; the text
/// between the two is parsed leniently and the trimmed remainder becomes the
/// body. An unclosed header is malformed: the whole text is kept as body.
pub fn split_frontmatter(input: &str) -> FrontmatterSplit {
    if !input.starts_with(DELIMITER) {
        return FrontmatterSplit {
            frontmatter: None,
            body: input.trim().to_string(),
            malformed: false,
        };
    }

    match input[DELIMITER.len()..].find(DELIMITER) {
        Some(rel) => {
            let end = DELIMITER.len() + rel;
            let block = &input[DELIMITER.len()..end];
            let body = input[end + DELIMITER.len()..].trim().to_string();
            let frontmatter = parse_block(block);
            FrontmatterSplit {
                frontmatter: frontmatter.filter(|fm| !fm.is_empty()),
                body,
                malformed: false,
            }
        }
        None => {
            log::warn!("frontmatter opened with '---' but never closed; treating whole text as body");
            FrontmatterSplit {
                frontmatter: None,
                body: input.trim().to_string(),
                malformed: true,
            }
        }
    }
}

/// Parses a header block, preferring YAML and falling back to line-wise
/// `key: value` extraction when the YAML is invalid.
fn parse_block(block: &str) -> Option<Frontmatter> {
    if block.trim().is_empty() {
        return None;
    }

    match serde_yaml::from_str::<serde_yaml::Value>(block) {
        Ok(serde_yaml::Value::Mapping(mapping)) => {
            let mut fm = Frontmatter::default();
            for (key, value) in mapping {
                let (Some(key), Some(value)) = (yaml_scalar(&key), yaml_scalar(&value)) else {
                    continue;
                };
                fm.set(&key, value);
            }
            Some(fm)
        }
        Ok(_) => parse_block_lines(block),
        Err(err) => {
            log::debug!("frontmatter YAML parse failed ({err}); falling back to line scan");
            parse_block_lines(block)
        }
    }
}

fn yaml_scalar(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

static KEY_VALUE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(\w+):\s*(?:"([^"]*)"|'([^']*)'|(.*))$"#).expect("key/value line pattern")
});

/// Line-wise fallback for headers that are not valid YAML.
fn parse_block_lines(block: &str) -> Option<Frontmatter> {
    let mut fm = Frontmatter::default();
    for line in block.lines() {
        let line = line.trim();
        let Some(caps) = KEY_VALUE_LINE.captures(line) else {
            continue;
        };
        let key = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        if !value.is_empty() {
            fm.set(key, value);
        }
    }
    if fm.is_empty() { None } else { Some(fm) }
}

/// Drops residual frontmatter lines from the head of a body.
///
/// Handles content that was double-processed or hand-edited: stray `---`
/// markers and leading `key: value` lines for the known frontmatter keys are
/// removed until the first real content line.
pub fn scrub_residual_frontmatter(body: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut at_head = true;

    for line in body.lines() {
        if at_head {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed == DELIMITER {
                continue;
            }
            if is_known_key_line(trimmed) {
                log::debug!("dropping residual frontmatter line: {trimmed}");
                continue;
            }
            at_head = false;
        }
        kept.push(line);
    }

    kept.join("\n")
}

fn is_known_key_line(line: &str) -> bool {
    KNOWN_KEYS
        .iter()
        .any(|key| line.strip_prefix(key).is_some_and(|rest| rest.starts_with(':')))
}

/// Composes the wire-format header from frontmatter fields.
///
/// Emits `key: "value"` lines for title, description, author, and date (in
/// that order, skipping absent fields), with internal double quotes escaped
/// as `\"`, delimited by `---` lines and followed by a blank line.
pub fn compose_frontmatter(frontmatter: &Frontmatter) -> String {
    let mut out = String::new();
    out.push_str(DELIMITER);
    out.push('\n');
    let fields = [
        ("title", &frontmatter.title),
        ("description", &frontmatter.description),
        ("author", &frontmatter.author),
        ("date", &frontmatter.date),
    ];
    for (key, value) in fields {
        if let Some(value) = value {
            out.push_str(key);
            out.push_str(": \"");
            out.push_str(&value.replace('"', "\\\""));
            out.push_str("\"\n");
        }
    }
    out.push_str(DELIMITER);
    out.push_str("\n\n");
    out
}
