//! Code fence tracking over emitted Markdown.
//!
//! The splitter uses this to avoid cutting a chunk inside a fenced code
//! block. Fences may sit behind blockquote markers or list indentation, so
//! those prefixes are skipped before looking for a marker.

/// Fence parsing phases tracked across lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FencePhase {
    /// Not currently inside a fence.
    #[default]
    Outside,
    /// Within fence contents.
    InsideFence,
}

/// Current fence state carried from line to line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FenceState {
    /// Current fence phase.
    pub phase: FencePhase,
    /// Fence marker character (`` ` `` or `~`).
    pub marker: Option<char>,
    /// Length of the opening fence.
    pub length: usize,
}

impl FenceState {
    /// Whether a fence is open.
    pub fn is_open(&self) -> bool {
        self.phase == FencePhase::InsideFence
    }
}

/// Outcome of processing a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineOutcome {
    /// State to carry into the next line.
    pub next_state: FenceState,
    /// The line opened or closed a fence.
    pub marker_line: bool,
}

/// Advance fence state over one line (without its newline).
pub fn advance_fence_state(line: &str, state: FenceState) -> LineOutcome {
    let body = strip_container_prefix(line);

    match state.phase {
        FencePhase::Outside => {
            if let Some((marker, length)) = detect_fence_marker(body) {
                return LineOutcome {
                    next_state: FenceState {
                        phase: FencePhase::InsideFence,
                        marker: Some(marker),
                        length,
                    },
                    marker_line: true,
                };
            }
        }
        FencePhase::InsideFence => {
            if is_closing_fence(body)
                && let Some((marker, length)) = detect_fence_marker(body)
                && Some(marker) == state.marker
                && length >= state.length
            {
                return LineOutcome {
                    next_state: FenceState::default(),
                    marker_line: true,
                };
            }
        }
    }

    LineOutcome {
        next_state: state,
        marker_line: false,
    }
}

/// Whether `text` ends inside an unclosed fence.
///
/// A trailing partial line counts: a cut in the middle of an opening
/// marker line leaves the fence open.
pub fn ends_inside_fence(text: &str) -> bool {
    text.split('\n')
        .fold(FenceState::default(), |state, line| {
            advance_fence_state(line, state).next_state
        })
        .is_open()
}

/// Byte offsets just past every line that closes a fence.
pub fn closing_fence_ends(text: &str) -> Vec<usize> {
    let mut ends = Vec::new();
    let mut state = FenceState::default();
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let was_open = state.is_open();
        let outcome = advance_fence_state(line.trim_end_matches('\n'), state);
        offset += line.len();
        if was_open && outcome.marker_line && line.ends_with('\n') {
            ends.push(offset);
        }
        state = outcome.next_state;
    }
    ends
}

/// Info-string language of the first fence opened in `text` that has one.
pub fn first_fence_language(text: &str) -> Option<String> {
    let mut state = FenceState::default();
    for line in text.lines() {
        let outcome = advance_fence_state(line, state);
        if !state.is_open()
            && outcome.next_state.is_open()
            && let Some(marker) = outcome.next_state.marker
            && let Some(language) = strip_container_prefix(line)
                .trim_start_matches(marker)
                .split_whitespace()
                .next()
        {
            return Some(language.to_string());
        }
        state = outcome.next_state;
    }
    None
}

fn strip_list_marker(line: &str) -> Option<&str> {
    if let Some(rest) = line.strip_prefix(['-', '*', '+']) {
        return rest.strip_prefix(' ');
    }
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    line[digits..]
        .strip_prefix(['.', ')'])
        .and_then(|rest| rest.strip_prefix(' '))
}

fn strip_container_prefix(line: &str) -> &str {
    let mut rest = line;
    loop {
        let trimmed = rest.trim_start_matches([' ', '\t']);
        match trimmed.strip_prefix('>').or_else(|| strip_list_marker(trimmed)) {
            Some(after) => rest = after,
            None => return trimmed,
        }
    }
}

fn detect_fence_marker(body: &str) -> Option<(char, usize)> {
    let first = body.chars().next()?;
    if first != '`' && first != '~' {
        return None;
    }
    let run_len = body.chars().take_while(|c| *c == first).count();
    (run_len >= 3).then_some((first, run_len))
}

/// A closing fence has only markers followed by optional whitespace.
fn is_closing_fence(body: &str) -> bool {
    let Some(first) = body.chars().next() else {
        return false;
    };
    if first != '`' && first != '~' {
        return false;
    }
    let rest = body.trim_start_matches(first);
    body.len() - rest.len() >= 3 && rest.trim().is_empty()
}
