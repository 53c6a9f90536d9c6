//! Ordered content normalization rewrites.
//!
//! Stored content accumulated several authoring conventions over time. Each
//! rewrite rule below converts one legacy convention into the canonical form
//! the rest of the pipeline understands. Rules run in a fixed order and are
//! individually fallible: a failing rule logs, records a
//! [`RenderWarning::NormalizationRuleFailure`], and leaves the text exactly
//! as it was before that rule ran.

use lol_html::{RewriteStrSettings, element, rewrite_str};
use once_cell::sync::Lazy;
use prosa_core::{FenceState, PipelineError, RenderDiagnostics, RenderWarning, advance_fence_state};
use regex::Regex;

type Rule = fn(&str) -> Result<String, PipelineError>;

const RULES: [(&str, Rule); 6] = [
    ("fence-lang-file-shorthand", expand_lang_file_shorthand),
    ("fence-brace-highlight", expand_brace_highlight),
    ("fence-filename-key", unify_filename_key),
    ("fence-bare-filename", quote_bare_filename),
    ("image-binding-placeholder", placeholder_image_bindings),
    ("external-link-attrs", annotate_external_links),
];

/// Applies all normalization rules to content, in order.
///
/// Never fails as a whole: each rule's failure is recovered by keeping the
/// pre-rule text and recording a warning.
pub fn normalize_content(content: &str, diagnostics: &mut RenderDiagnostics) -> String {
    let mut text = content.to_string();
    for (name, rule) in RULES {
        match rule(&text) {
            Ok(next) => text = next,
            Err(err) => {
                log::warn!("normalization rule '{name}' failed: {err}");
                diagnostics.push(RenderWarning::NormalizationRuleFailure {
                    rule: name.to_string(),
                });
            }
        }
    }
    text
}

static LANG_FILE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^```(\w+):([^\s`]+)([^\n]*)$").expect("lang:file fence pattern"));

/// ```` ```ts:util.ts ```` becomes ```` ```ts filename="util.ts" ````.
fn expand_lang_file_shorthand(text: &str) -> Result<String, PipelineError> {
    Ok(LANG_FILE_FENCE
        .replace_all(text, "```${1} filename=\"${2}\"${3}")
        .into_owned())
}

static BRACE_HIGHLIGHT_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^```(\w+)\{([\d,\-\s]*)\}([^\n]*)$").expect("brace highlight fence pattern")
});

/// ```` ```js{1,3-5} ```` becomes ```` ```js highlight={1,3-5} ````.
fn expand_brace_highlight(text: &str) -> Result<String, PipelineError> {
    Ok(BRACE_HIGHLIGHT_FENCE
        .replace_all(text, "```${1} highlight={${2}}${3}")
        .into_owned())
}

static FILENAME_KEY_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^(```[^\n]*?[ \t])(?:title|file)=("|')"#).expect("filename key fence pattern")
});

/// `title="x"` and `file="x"` fence annotations become `filename="x"`.
fn unify_filename_key(text: &str) -> Result<String, PipelineError> {
    Ok(FILENAME_KEY_FENCE
        .replace_all(text, "${1}filename=${2}")
        .into_owned())
}

static BARE_FILENAME_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^```(\w+)[ \t]+([\w./\-]+\.\w+)[ \t]*$").expect("bare filename fence pattern")
});

/// A bare second fence token with an extension becomes an explicit
/// `filename="..."` annotation.
fn quote_bare_filename(text: &str) -> Result<String, PipelineError> {
    Ok(BARE_FILENAME_FENCE
        .replace_all(text, "```${1} filename=\"${2}\"")
        .into_owned())
}

/// Applies a rewrite to the regions of text outside fenced code blocks,
/// passing fence lines (openers, contents, closers) through untouched.
///
/// Fence-targeted rules above inspect opener lines on purpose; the rules
/// below rewrite article prose and must not alter displayed code.
fn rewrite_outside_fences(
    text: &str,
    rule: impl Fn(&str) -> Result<String, PipelineError>,
) -> Result<String, PipelineError> {
    let mut out = String::with_capacity(text.len());
    let mut chunk = String::new();
    let mut state = FenceState::default();

    for line in text.lines() {
        let outcome = advance_fence_state(line, state);
        state = outcome.next_state;
        if outcome.in_fence {
            if !chunk.is_empty() {
                out.push_str(&rule(&chunk)?);
                chunk.clear();
            }
            out.push_str(line);
            out.push('\n');
        } else {
            chunk.push_str(line);
            chunk.push('\n');
        }
    }
    if !chunk.is_empty() {
        out.push_str(&rule(&chunk)?);
    }
    if !text.ends_with('\n') && out.ends_with('\n') {
        out.pop();
    }
    Ok(out)
}

static IMAGE_BINDING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<Image\s+src=\{\s*([A-Za-z_]\w*)\s*\}([^>]*)>").expect("image binding pattern")
});

/// `<Image src={hero} ...>` becomes `<Image src="__IMAGE_hero__" ...>`.
///
/// The placeholder token is later substituted by the image resolver once the
/// filename/URL map is known. Quoted `src` values are left alone.
fn placeholder_image_bindings(text: &str) -> Result<String, PipelineError> {
    rewrite_outside_fences(text, |chunk| {
        Ok(IMAGE_BINDING
            .replace_all(chunk, "<Image src=\"__IMAGE_${1}__\"${2}>")
            .into_owned())
    })
}

/// Adds `target="_blank"` and `rel="noopener noreferrer"` to external
/// anchors that do not already carry those attributes.
fn annotate_external_links(text: &str) -> Result<String, PipelineError> {
    rewrite_outside_fences(text, annotate_anchors_in_chunk)
}

fn annotate_anchors_in_chunk(text: &str) -> Result<String, PipelineError> {
    rewrite_str(
        text,
        RewriteStrSettings {
            element_content_handlers: vec![element!("a[href]", |el| {
                let href = el.get_attribute("href").unwrap_or_default();
                if href.starts_with("http://") || href.starts_with("https://") {
                    if el.get_attribute("target").is_none() {
                        el.set_attribute("target", "_blank")?;
                    }
                    if el.get_attribute("rel").is_none() {
                        el.set_attribute("rel", "noopener noreferrer")?;
                    }
                }
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| PipelineError::Internal(format!("anchor rewrite failed: {err}")))
}
