//! Boundary-aware chunk splitter.
//!
//! Runs the regular conversion and cuts its output into chunks as it is
//! produced. Split headings and horizontal rules end a chunk outright; when
//! the unflushed output grows past `chunk_size` it is cut at the best
//! boundary available (paragraph, code fence end, line, word) without ever
//! leaving a fenced code block open.

use crate::error::ConfigError;
use crate::fence;
use crate::node::{NodeId, TextNode};
use crate::options::{LengthFunction, SplitterOptions};
use crate::processor::MarkdownProcessor;
use crate::tags::TagId;
use crate::tokenizer::{self, EventSink, ParseState};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};

/// Bytes of HTML handed to the tokenizer per step.
const FEED_SIZE: usize = 16 * 1024;

/// 1-based inclusive line range within the full Markdown output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineRange {
    /// First line.
    pub from: usize,
    /// Last line.
    pub to: usize,
}

/// Metadata attached to a chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    /// Lines covered by the chunk.
    pub lines: LineRange,
    /// Enclosing headings, keyed `h1`..`h6`.
    pub headers: BTreeMap<String, String>,
    /// Language of the first fenced code block in the chunk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_block: Option<String>,
}

/// A piece of Markdown plus its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkdownChunk {
    /// Trimmed Markdown.
    pub content: String,
    /// Position and context.
    pub metadata: ChunkMetadata,
}

struct Settings {
    chunk_size: usize,
    chunk_overlap: usize,
    split_levels: Vec<u8>,
    strip_headers: bool,
    return_each_line: bool,
    length: LengthFunction,
}

impl Settings {
    /// Headings recorded in the metadata: split levels, plus any level
    /// above all of them.
    fn records_heading(&self, level: u8) -> bool {
        self.split_levels.contains(&level)
            || self.split_levels.iter().min().is_some_and(|&top| level < top)
    }
}

/// Consumed bytes kept at the front of the buffer before compacting.
const COMPACT_AFTER: usize = 64 * 1024;

/// Event sink wrapping the processor and cutting its output.
struct ChunkSink {
    processor: MarkdownProcessor,
    settings: Settings,
    /// Output not yet handed out starts at `start`.
    buffer: String,
    start: usize,
    /// Line number of `buffer[start]`.
    buffer_line: usize,
    /// Bytes after `start` repeated from the previous chunk.
    carried: usize,
    headers: BTreeMap<String, String>,
    heading_text: Option<String>,
    split_level_seen: Option<u8>,
    ready: VecDeque<MarkdownChunk>,
}

impl ChunkSink {
    fn measure(&self, text: &str) -> usize {
        self.settings.length.measure(text)
    }

    fn unflushed(&self) -> &str {
        &self.buffer[self.start..]
    }

    fn collect_output(&mut self) {
        let out = self.processor.take_settled();
        self.buffer.push_str(&out);
    }

    fn after_event(&mut self) {
        self.collect_output();
        self.split_oversized(false);
    }

    /// Cut while the unflushed output exceeds the chunk size.
    fn split_oversized(&mut self, finished: bool) {
        while let Some(limit) = self.size_limit() {
            let Some(split) = self.split_point(limit, finished) else {
                log::debug!(
                    "waiting for more input before splitting {} bytes",
                    self.buffer.len() - self.start
                );
                return;
            };
            let keep_from = self.overlap_start(split);
            log::debug!("size split at byte {split}, carrying {} bytes", split - keep_from);
            self.emit_chunk(split);
            self.advance_buffer(keep_from);
            self.carried = split - keep_from;
        }
    }

    /// Largest char boundary whose prefix fits in `chunk_size`, or `None`
    /// when all unflushed output fits.
    ///
    /// Only a window just past the limit is measured; it doubles while its
    /// prefix still fits.
    fn size_limit(&self) -> Option<usize> {
        let text = self.unflushed();
        let size = self.settings.chunk_size;
        let mut window = size.saturating_add(1).max(64);
        loop {
            let end = text
                .char_indices()
                .nth(window)
                .map_or(text.len(), |(index, _)| index);
            let fits = self.measure(&text[..end]) <= size;
            if fits && end == text.len() {
                return None;
            }
            if !fits {
                return Some(self.limit_within(&text[..end]));
            }
            window = window.saturating_mul(2);
        }
    }

    fn limit_within(&self, prefix: &str) -> usize {
        let boundaries: Vec<usize> = prefix
            .char_indices()
            .map(|(index, _)| index)
            .chain(std::iter::once(prefix.len()))
            .collect();
        let (mut low, mut high) = (1.min(boundaries.len() - 1), boundaries.len() - 1);
        while low < high {
            let mid = (low + high).div_ceil(2);
            if self.measure(&prefix[..boundaries[mid]]) <= self.settings.chunk_size {
                low = mid;
            } else {
                high = mid - 1;
            }
        }
        boundaries[low]
    }

    fn split_point(&self, limit: usize, finished: bool) -> Option<usize> {
        let text = self.unflushed();
        let window = &text[..limit];
        let floor = self.carried;
        let fence_ends = fence::closing_fence_ends(window);

        let candidate = window
            .rmatch_indices("\n\n")
            .map(|(index, _)| index + 2)
            .chain(fence_ends.iter().rev().copied())
            .chain(window.rmatch_indices('\n').map(|(index, _)| index + 1))
            .chain(window.rmatch_indices(' ').map(|(index, _)| index + 1))
            .find(|&split| split > floor && !fence::ends_inside_fence(&text[..split]));
        if candidate.is_some() {
            return candidate;
        }

        if limit > floor && !fence::ends_inside_fence(window) {
            return Some(limit);
        }
        // The limit falls inside a code block: cut right after it closes.
        let after_fence = fence::closing_fence_ends(text)
            .into_iter()
            .find(|&end| end > limit);
        if after_fence.is_none() && finished {
            log::warn!("unterminated code block exceeds the chunk size");
        }
        after_fence
    }

    /// Start of the overlap carried from a cut at `split`.
    fn overlap_start(&self, split: usize) -> usize {
        if self.settings.chunk_overlap == 0 {
            return split;
        }
        let text = self.unflushed();
        let boundaries: Vec<usize> = text[..split]
            .char_indices()
            .map(|(index, _)| index)
            .skip(1)
            .chain(std::iter::once(split))
            .collect();
        // Smallest start whose tail fits in the overlap; never the whole chunk.
        let start = boundaries.partition_point(|&start| {
            self.measure(&text[start..split]) > self.settings.chunk_overlap
        });
        let mut keep_from = boundaries.get(start).copied().unwrap_or(split);
        // Begin the overlap at a word.
        let tail = &text[keep_from..split];
        if !text[..keep_from].ends_with(char::is_whitespace)
            && let Some((index, space)) = tail.char_indices().find(|(_, c)| c.is_whitespace())
        {
            keep_from += index + space.len_utf8();
        }
        // The carried text must not open or close a code block on its own.
        while keep_from < split && fence::ends_inside_fence(&text[keep_from..split]) {
            keep_from = match text[keep_from..split].find('\n') {
                Some(newline) => keep_from + newline + 1,
                None => split,
            };
        }
        keep_from.min(split)
    }

    /// Drop `consumed` bytes of unflushed output.
    fn advance_buffer(&mut self, consumed: usize) {
        let lines = self.unflushed()[..consumed].matches('\n').count();
        self.buffer_line += lines;
        self.start += consumed;
        if self.start > COMPACT_AFTER && self.start * 2 > self.buffer.len() {
            self.buffer.drain(..self.start);
            self.start = 0;
        }
    }

    /// Flush all unflushed output without overlap.
    fn flush_all(&mut self) {
        let end = self.buffer.len() - self.start;
        self.emit_chunk(end);
        self.advance_buffer(end);
        self.carried = 0;
        self.split_level_seen = None;
    }

    fn emit_chunk(&mut self, end: usize) {
        let raw = &self.buffer[self.start..self.start + end];
        let leading = raw.len() - raw.trim_start().len();
        let trimmed = raw.trim();
        let from = self.buffer_line + raw[..leading].matches('\n').count();
        let metadata = ChunkMetadata {
            lines: LineRange {
                from,
                to: from + trimmed.matches('\n').count(),
            },
            headers: self.headers.clone(),
            code_block: fence::first_fence_language(trimmed),
        };

        if self.settings.return_each_line {
            for (offset, line) in trimmed.lines().enumerate() {
                if self.settings.strip_headers && is_heading_line(line) {
                    continue;
                }
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let number = from + offset;
                self.ready.push_back(MarkdownChunk {
                    content: line.to_string(),
                    metadata: ChunkMetadata {
                        lines: LineRange {
                            from: number,
                            to: number,
                        },
                        ..metadata.clone()
                    },
                });
            }
            return;
        }

        let content = if self.settings.strip_headers {
            strip_heading_lines(trimmed)
        } else {
            trimmed.to_string()
        };
        if content.is_empty() {
            return;
        }
        self.ready.push_back(MarkdownChunk { content, metadata });
    }

    fn finish(&mut self) {
        self.collect_output();
        let rest = self.processor.take_remaining();
        self.buffer.push_str(&rest);
        self.split_oversized(true);
        self.flush_all();
    }
}

fn is_heading_line(line: &str) -> bool {
    let hashes = line.bytes().take_while(|b| *b == b'#').count();
    (1..=6).contains(&hashes) && line[hashes..].starts_with(' ')
}

/// Drop heading lines, collapsing the blank lines they leave behind.
fn strip_heading_lines(content: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    for line in content.lines() {
        if is_heading_line(line) {
            continue;
        }
        if line.trim().is_empty() && kept.last().is_some_and(|last| last.trim().is_empty()) {
            continue;
        }
        kept.push(line);
    }
    kept.join("\n").trim().to_string()
}

impl EventSink for ChunkSink {
    fn node_enter(&mut self, state: &mut ParseState, node: NodeId) {
        let tag = state.node(node).map_or(TagId::Unknown, |element| element.tag);
        if let Some(level) = tag.heading_level() {
            if self.settings.split_levels.contains(&level) {
                if self.split_level_seen.is_some_and(|seen| seen >= level) {
                    self.collect_output();
                    log::debug!("heading split before h{level}");
                    self.flush_all();
                }
                self.split_level_seen =
                    Some(self.split_level_seen.map_or(level, |seen| seen.max(level)));
            }
            if self.settings.records_heading(level) {
                self.heading_text = Some(String::new());
            }
        }
        self.processor.node_enter(state, node);
        self.after_event();
    }

    fn text(&mut self, state: &mut ParseState, text: TextNode) {
        if let Some(heading) = self.heading_text.as_mut()
            && !text.excluded_from_markdown
        {
            heading.push_str(&tokenizer::unescape_markdown(&text.value));
        }
        self.processor.text(state, text);
        self.after_event();
    }

    fn node_exit(&mut self, state: &mut ParseState, node: NodeId) {
        let tag = state.node(node).map_or(TagId::Unknown, |element| element.tag);
        self.processor.node_exit(state, node);
        self.after_event();

        if let Some(level) = tag.heading_level()
            && self.settings.records_heading(level)
            && let Some(text) = self.heading_text.take()
        {
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            self.headers
                .retain(|key, _| key[1..].parse::<u8>().is_ok_and(|other| other < level));
            if !text.is_empty() {
                self.headers.insert(format!("h{level}"), text);
            }
        }
        if tag == TagId::Hr {
            log::debug!("thematic break split");
            self.flush_all();
        }
    }
}

/// Lazy iterator over the chunks of one document.
pub struct Chunks {
    html: String,
    offset: usize,
    pending: String,
    state: ParseState,
    sink: ChunkSink,
    finished: bool,
}

impl Chunks {
    fn feed(&mut self) {
        let mut end = (self.offset + FEED_SIZE).min(self.html.len());
        while !self.html.is_char_boundary(end) {
            end += 1;
        }
        self.pending.push_str(&self.html[self.offset..end]);
        self.offset = end;

        let consumed = tokenizer::advance(&mut self.state, &self.pending, &mut self.sink);
        self.pending.drain(..consumed);

        if self.offset == self.html.len() {
            tokenizer::finish(&mut self.state, &self.pending, &mut self.sink);
            self.pending.clear();
            self.sink.finish();
            self.finished = true;
        }
    }
}

impl Iterator for Chunks {
    type Item = MarkdownChunk;

    fn next(&mut self) -> Option<MarkdownChunk> {
        loop {
            if let Some(chunk) = self.sink.ready.pop_front() {
                return Some(chunk);
            }
            if self.finished {
                return None;
            }
            self.feed();
        }
    }
}

/// Convert `html` and split the Markdown into chunks.
///
/// Fails before doing any work when the options are inconsistent.
pub fn html_to_markdown_split_chunks(
    html: &str,
    options: SplitterOptions,
) -> Result<Chunks, ConfigError> {
    options.validate()?;
    let settings = Settings {
        chunk_size: options.chunk_size,
        chunk_overlap: options.chunk_overlap,
        split_levels: options
            .headers_to_split_on
            .iter()
            .filter(|tag| options.splits_on(**tag))
            .filter_map(|tag| tag.heading_level())
            .collect(),
        strip_headers: options.strip_headers,
        return_each_line: options.return_each_line,
        length: options.length_function,
    };
    Ok(Chunks {
        html: html.to_string(),
        offset: 0,
        pending: String::new(),
        state: ParseState::new(),
        sink: ChunkSink {
            processor: MarkdownProcessor::new(options.convert),
            settings,
            buffer: String::new(),
            start: 0,
            buffer_line: 1,
            carried: 0,
            headers: BTreeMap::new(),
            heading_text: None,
            split_level_seen: None,
            ready: VecDeque::new(),
        },
        finished: false,
    })
}
