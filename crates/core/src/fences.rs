//! Fence state tracking and module statement stripping.
//!
//! Stored MDX bodies may carry root-level `import`/`export` statements left
//! over from an earlier authoring format. The renderer drops them before
//! parsing, but only outside fenced code blocks: an `import` line inside a
//! fence is code to display, not a statement to strip.

/// Fence parsing phases tracked across lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FencePhase {
    /// Not currently inside a fence.
    #[default]
    Outside,
    /// Within fence contents.
    InsideFence,
}

/// Current fence state (phase, marker, and indent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FenceState {
    /// Current fence phase.
    pub phase: FencePhase,
    /// Fence marker character (backtick or tilde) captured at opening.
    pub marker: Option<char>,
    /// Leading whitespace count captured at opening.
    pub indent: usize,
}

/// Outcome of processing one line for fence state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineOutcome {
    /// State to carry into the next line.
    pub next_state: FenceState,
    /// Whether this line belongs to a fence (opener, contents, or closer).
    pub in_fence: bool,
}

/// Advance fence state based on a single line of text.
pub fn advance_fence_state(line: &str, state: FenceState) -> LineOutcome {
    let indent = leading_whitespace_len(line);
    let after_indent = &line[indent..];

    let mut next_state = state;
    let mut in_fence = matches!(state.phase, FencePhase::InsideFence);

    if matches!(state.phase, FencePhase::Outside)
        && let Some(marker) = detect_fence_marker(after_indent)
    {
        next_state = FenceState {
            phase: FencePhase::InsideFence,
            marker: Some(marker),
            indent,
        };
        in_fence = true;
    } else if matches!(state.phase, FencePhase::InsideFence)
        && indent <= state.indent
        && is_closing_fence(after_indent)
        && detect_fence_marker(after_indent) == state.marker
    {
        next_state = FenceState::default();
        in_fence = true;
    }

    LineOutcome { next_state, in_fence }
}

/// Result of stripping root-level module statements from a body.
#[derive(Debug, Clone, Default)]
pub struct StrippedBody {
    /// The removed `import`/`export` statements, in document order.
    pub statements: Vec<String>,
    /// The remaining body text.
    pub body: String,
}

/// Removes root-level `import`/`export` statements outside fenced blocks.
///
/// Multi-line statements are followed via bracket depth (quote-aware), so
/// `import {\n  A,\n  B,\n} from 'x'` is removed whole. Statements inside
/// code fences are untouched.
pub fn strip_module_statements(body: &str) -> StrippedBody {
    let mut fence_state = FenceState::default();
    let mut statements = Vec::new();
    let mut kept: Vec<String> = Vec::new();
    let mut buffer = String::new();
    let mut depth: isize = 0;
    let mut collecting = false;

    for line in body.lines() {
        let outcome = advance_fence_state(line, fence_state);
        fence_state = outcome.next_state;

        if outcome.in_fence {
            if collecting {
                // A fence opener interrupts an unterminated statement; give
                // up on it and keep the buffered lines as body text.
                log::debug!("unterminated module statement interrupted by fence");
                kept.extend(buffer.trim_end().lines().map(str::to_string));
                buffer.clear();
                collecting = false;
                depth = 0;
            }
            kept.push(line.to_string());
            continue;
        }

        if collecting {
            buffer.push_str(line);
            buffer.push('\n');
            depth += bracket_delta(line);
            if statement_ends(line, depth) {
                statements.push(buffer.trim_end().to_string());
                buffer.clear();
                collecting = false;
                depth = 0;
            }
            continue;
        }

        let trimmed = line.trim_start();
        if trimmed.starts_with("import ") || trimmed.starts_with("export ") {
            buffer.push_str(line);
            buffer.push('\n');
            depth = bracket_delta(line);
            if statement_ends(line, depth) {
                statements.push(buffer.trim_end().to_string());
                buffer.clear();
            } else {
                collecting = true;
            }
            continue;
        }

        kept.push(line.to_string());
    }

    if collecting && !buffer.is_empty() {
        statements.push(buffer.trim_end().to_string());
    }

    StrippedBody {
        statements,
        body: kept.join("\n"),
    }
}

/// A statement ends when brackets are balanced and the line does not end
/// with an explicit continuation.
fn statement_ends(line: &str, depth: isize) -> bool {
    if depth > 0 {
        return false;
    }
    let trimmed = line.trim_end();
    !(trimmed.ends_with(',') || trimmed.ends_with('\\') || trimmed.ends_with('(') || trimmed.ends_with('{'))
}

/// Net bracket depth change of a line, ignoring brackets inside quotes.
fn bracket_delta(line: &str) -> isize {
    let mut depth: isize = 0;
    let mut in_single = false;
    let mut in_double = false;
    let mut in_template = false;
    let mut escape = false;

    for ch in line.chars() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' => escape = true,
            '\'' if !in_double && !in_template => in_single = !in_single,
            '"' if !in_single && !in_template => in_double = !in_double,
            '`' if !in_single && !in_double => in_template = !in_template,
            '(' | '{' | '[' if !in_single && !in_double && !in_template => depth += 1,
            ')' | '}' | ']' if !in_single && !in_double && !in_template => depth -= 1,
            _ => {}
        }
    }

    depth
}

fn leading_whitespace_len(line: &str) -> usize {
    line.bytes()
        .take_while(|b| matches!(*b, b' ' | b'\t'))
        .count()
}

fn detect_fence_marker(after_indent: &str) -> Option<char> {
    let mut chars = after_indent.chars();
    let first = chars.next()?;
    if first != '`' && first != '~' {
        return None;
    }
    let run_len = 1 + chars.take_while(|c| *c == first).count();
    if run_len >= 3 { Some(first) } else { None }
}

/// A closing fence is markers followed by nothing but whitespace.
fn is_closing_fence(after_indent: &str) -> bool {
    let mut chars = after_indent.chars();
    let first = match chars.next() {
        Some(c) if c == '`' || c == '~' => c,
        _ => return false,
    };
    let mut count = 1;
    for c in chars.by_ref() {
        if c == first {
            count += 1;
        } else {
            return count >= 3 && c.is_whitespace() && chars.all(char::is_whitespace);
        }
    }
    count >= 3
}
