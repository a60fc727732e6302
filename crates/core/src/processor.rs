//! Markdown processor: the [`EventSink`] that turns tokenizer events into
//! Markdown.
//!
//! Block separation is not written eagerly. Spacing requests from the tag
//! table are merged (as a maximum) into a pending-newline counter and only
//! flushed in front of the next visible content, so adjacent blocks never
//! produce more than one blank line and an empty element produces nothing.
//! Opening markers are held back the same way and dropped when the element
//! turns out to be empty.

use crate::handlers::{Fragment, HandlerContext, RenderState};
use crate::node::{ElementNode, NodeId, TextNode};
use crate::options::ConvertOptions;
use crate::plugin::{HookContext, Plugin};
use crate::regions::{DEFAULT_REGION, RegionId, Regions};
use crate::tags::TagId;
use crate::tokenizer::{EventSink, ParseState};
use std::borrow::Cow;
use url::Url;

#[derive(Debug)]
struct PendingMarker {
    node: NodeId,
    text: Cow<'static, str>,
    region: RegionId,
}

/// Line prefix contributed by an open blockquote or list item.
#[derive(Debug)]
struct LinePrefix {
    node: NodeId,
    text: Cow<'static, str>,
    /// The element's own marker has been written; later lines get `text`.
    active: bool,
}

/// Joins released segments into the final output.
///
/// Leading whitespace of the document is dropped and trailing whitespace
/// is held back until more content follows, so output released piecemeal
/// concatenates to exactly the output of a single call.
#[derive(Debug, Default)]
struct OutputJoiner {
    started: bool,
    held: String,
}

impl OutputJoiner {
    fn push(&mut self, text: &str, out: &mut String) {
        let text = if self.started {
            text
        } else {
            let trimmed = text.trim_start();
            if trimmed.is_empty() {
                return;
            }
            self.started = true;
            trimmed
        };
        let content_end = text.trim_end().len();
        if content_end == 0 {
            self.held.push_str(text);
            return;
        }
        out.push_str(&self.held);
        self.held.clear();
        out.push_str(&text[..content_end]);
        self.held.push_str(&text[content_end..]);
    }
}

/// Event sink producing Markdown into region buffers.
pub struct MarkdownProcessor {
    plugins: Vec<Box<dyn Plugin>>,
    regions: Regions,
    render: RenderState,
    origin: Option<Url>,
    joiner: OutputJoiner,
    markers: Vec<PendingMarker>,
    prefixes: Vec<LinePrefix>,
    pending_newlines: u8,
    pending_space: bool,
    line_has_content: bool,
    at_line_start: bool,
    wrote_anything: bool,
    last_char: Option<char>,
}

impl std::fmt::Debug for MarkdownProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkdownProcessor")
            .field("plugins", &self.plugins.len())
            .field("origin", &self.origin)
            .field("pending_newlines", &self.pending_newlines)
            .finish_non_exhaustive()
    }
}

impl MarkdownProcessor {
    /// Processor for one document.
    pub fn new(options: ConvertOptions) -> Self {
        let origin = options.origin.as_deref().and_then(|origin| {
            Url::parse(origin)
                .inspect_err(|error| log::warn!("ignoring invalid origin {origin:?}: {error}"))
                .ok()
        });
        Self {
            plugins: options.plugins,
            regions: Regions::new(),
            render: RenderState::default(),
            origin,
            joiner: OutputJoiner::default(),
            markers: Vec::new(),
            prefixes: Vec::new(),
            pending_newlines: 0,
            pending_space: false,
            line_has_content: false,
            at_line_start: true,
            wrote_anything: false,
            last_char: None,
        }
    }

    /// Release output whose regions are decided.
    pub fn take_settled(&mut self) -> String {
        self.drain(false)
    }

    /// Release everything; pending regions count as included.
    pub fn take_remaining(&mut self) -> String {
        self.drain(true)
    }

    fn drain(&mut self, finished: bool) -> String {
        let mut out = String::new();
        let joiner = &mut self.joiner;
        self.regions
            .drain_settled(finished, |text| joiner.push(text, &mut out));
        out
    }

    fn current_prefix(&self) -> String {
        self.prefixes
            .iter()
            .filter(|prefix| prefix.active)
            .map(|prefix| prefix.text.as_ref())
            .collect()
    }

    /// Write text, repeating the active line prefix after every newline.
    fn emit(&mut self, region: RegionId, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut out = String::with_capacity(text.len());
        let mut chars = text.chars().peekable();
        let prefix = if text.contains('\n') {
            self.current_prefix()
        } else {
            String::new()
        };
        while let Some(c) = chars.next() {
            out.push(c);
            if c == '\n' {
                self.line_has_content = false;
                self.at_line_start = true;
                match chars.peek() {
                    Some('\n') => out.push_str(prefix.trim_end()),
                    _ => out.push_str(&prefix),
                }
                continue;
            }
            self.at_line_start = false;
            if !c.is_whitespace() {
                self.line_has_content = true;
            }
        }
        self.last_char = out.chars().next_back();
        self.wrote_anything = true;
        self.regions.write(region, &out);
    }

    fn request_newlines(&mut self, count: u8, node: &ElementNode) {
        if count == 0 {
            return;
        }
        let in_cell = node.tag != TagId::Td
            && node.tag != TagId::Th
            && node.depth_of(TagId::Td) + node.depth_of(TagId::Th) > 0;
        if in_cell || (node.tag != TagId::A && node.depth_of(TagId::A) > 0) {
            self.pending_space = true;
            return;
        }
        // At the start of the document, or right after a marker that
        // opens a line and is still waiting for its content.
        if !self.wrote_anything || (!self.markers.is_empty() && !self.line_has_content) {
            return;
        }
        let nested_in_item = node.depth_of(TagId::Li) > u16::from(node.tag == TagId::Li);
        let count = if nested_in_item { count.min(1) } else { count };
        self.pending_newlines = self.pending_newlines.max(count);
    }

    fn flush_pending(&mut self, region: RegionId, inline: bool) {
        if self.pending_newlines > 0 {
            let newlines = "\n".repeat(self.pending_newlines as usize);
            self.pending_newlines = 0;
            self.pending_space = false;
            self.emit(region, &newlines);
        }
        if std::mem::take(&mut self.pending_space)
            && inline
            && self.line_has_content
            && !self.last_char.is_some_and(char::is_whitespace)
        {
            self.emit(region, " ");
        }
        for marker in std::mem::take(&mut self.markers) {
            self.emit(marker.region, &marker.text);
            if let Some(prefix) = self
                .prefixes
                .iter_mut()
                .rev()
                .find(|prefix| prefix.node == marker.node)
            {
                prefix.active = true;
            }
        }
    }

    fn apply(&mut self, node: NodeId, region: RegionId, fragment: Fragment) {
        match fragment {
            Fragment::Marker(text) => self.markers.push(PendingMarker { node, text, region }),
            Fragment::Block(text) => {
                self.flush_pending(region, false);
                self.emit(region, &text);
            }
            Fragment::Inline(text) => {
                self.flush_pending(region, true);
                self.emit(region, &text);
            }
            Fragment::Close(text) => {
                if let Some(position) = self.markers.iter().position(|marker| marker.node == node) {
                    self.markers.truncate(position);
                    return;
                }
                self.emit(region, &text);
            }
        }
    }

    fn write_plugin_block(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        if self.wrote_anything {
            self.pending_newlines = self.pending_newlines.max(2);
        }
        self.flush_pending(DEFAULT_REGION, false);
        self.emit(DEFAULT_REGION, text.trim_end());
        self.pending_newlines = 2;
    }

    fn write_text(&mut self, state: &ParseState, text: &TextNode) {
        let region = text
            .parent
            .and_then(|id| state.node(id))
            .map_or(DEFAULT_REGION, |node| node.region);

        if state.depth_of(TagId::Pre) > 0 {
            if let Some(opening) = self.render.open_fence() {
                self.flush_pending(region, false);
                self.emit(region, &opening);
            } else {
                self.flush_pending(region, false);
            }
            self.emit(region, &text.value);
            return;
        }

        let value = text.value.as_str();
        let core = value.trim();
        if value.starts_with(char::is_whitespace) {
            self.pending_space = true;
        }
        if core.is_empty() {
            return;
        }
        self.flush_pending(region, true);
        self.emit(region, core);
        if state.depth_of(TagId::A) > 0 {
            self.render.record_link_text(core);
        }
        if value.ends_with(char::is_whitespace) {
            self.pending_space = true;
        }
    }
}

impl EventSink for MarkdownProcessor {
    fn node_enter(&mut self, state: &mut ParseState, id: NodeId) {
        for index in 0..self.plugins.len() {
            let mut cx = HookContext::new(state, &mut self.regions, Some(id));
            if let Some(block) = self.plugins[index].on_node_enter(&mut cx) {
                self.write_plugin_block(&block);
            }
        }

        let Some(node) = state.node(id) else {
            return;
        };
        if node.excluded {
            return;
        }
        let spec = node.tag.spec();
        let region = node.region;
        self.request_newlines(node.tag.spec().spacing.before, node);

        let Some(enter) = spec.enter else {
            return;
        };
        let mut cx = HandlerContext {
            node,
            parent: node.parent.and_then(|parent| state.node(parent)),
            render: &mut self.render,
            origin: self.origin.as_ref(),
            at_line_start: self.at_line_start,
        };
        let Some(fragment) = enter(&mut cx) else {
            return;
        };
        if let Fragment::Marker(marker) = &fragment
            && matches!(node.tag, TagId::Li | TagId::Blockquote)
        {
            let text: Cow<'static, str> = if node.tag == TagId::Blockquote {
                "> ".into()
            } else {
                " ".repeat(marker.chars().count()).into()
            };
            self.prefixes.push(LinePrefix {
                node: id,
                text,
                active: false,
            });
        }
        self.apply(id, region, fragment);
    }

    fn text(&mut self, state: &mut ParseState, mut text: TextNode) {
        for index in 0..self.plugins.len() {
            let mut cx = HookContext::new(state, &mut self.regions, text.parent);
            if let Some(replacement) = self.plugins[index].process_text_node(&text, &mut cx) {
                text.whitespace_only = replacement.trim().is_empty();
                text.value = replacement;
            }
        }

        let parent = text.parent.and_then(|id| state.node(id));
        if text.excluded_from_markdown || parent.is_some_and(|node| node.excluded) {
            return;
        }
        if text.whitespace_only
            && parent.is_some_and(|node| node.tag.spec().collapses_inner_whitespace)
        {
            return;
        }
        self.write_text(state, &text);
    }

    fn node_exit(&mut self, state: &mut ParseState, id: NodeId) {
        if let Some(node) = state.node(id)
            && !node.excluded
        {
            let region = node.region;
            if let Some(exit) = node.tag.spec().exit {
                let mut cx = HandlerContext {
                    node,
                    parent: node.parent.and_then(|parent| state.node(parent)),
                    render: &mut self.render,
                    origin: self.origin.as_ref(),
                    at_line_start: self.at_line_start,
                };
                if let Some(fragment) = exit(&mut cx) {
                    self.apply(id, region, fragment);
                }
            }
            self.request_newlines(node.tag.spec().spacing.after, node);
        }

        for index in 0..self.plugins.len() {
            let mut cx = HookContext::new(state, &mut self.regions, Some(id));
            if let Some(block) = self.plugins[index].on_node_exit(&mut cx) {
                self.write_plugin_block(&block);
            }
        }

        if let Some(position) = self.markers.iter().position(|marker| marker.node == id) {
            self.markers.truncate(position);
        }
        if let Some(position) = self.prefixes.iter().rposition(|prefix| prefix.node == id) {
            self.prefixes.remove(position);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::{advance, finish};

    fn convert(html: &str) -> String {
        let mut state = ParseState::new();
        let mut processor = MarkdownProcessor::new(ConvertOptions::default());
        let consumed = advance(&mut state, html, &mut processor);
        finish(&mut state, &html[consumed..], &mut processor);
        processor.take_remaining()
    }

    #[test]
    fn joiner_trims_document_edges() {
        let mut joiner = OutputJoiner::default();
        let mut out = String::new();
        joiner.push("\n\n", &mut out);
        joiner.push("  a\n\n", &mut out);
        assert_eq!(out, "a");
        joiner.push("b  ", &mut out);
        assert_eq!(out, "a\n\nb");
    }

    #[test]
    fn merges_spacing_between_blocks() {
        assert_eq!(convert("<div><p>a</p></div><div><p>b</p></div>"), "a\n\nb");
        assert_eq!(convert("<p>a</p><br><br><p>b</p>"), "a\n\nb");
    }

    #[test]
    fn drops_empty_markers() {
        assert_eq!(convert("<p>a<strong> </strong>b</p>"), "a b");
        assert_eq!(convert("<h2></h2><p>x</p>"), "x");
        assert_eq!(convert("<ul><li></li><li>y</li></ul>"), "- y");
    }

    #[test]
    fn moves_inline_whitespace_outside_markers() {
        assert_eq!(convert("<p>a<em> b </em>c</p>"), "a _b_ c");
    }

    #[test]
    fn prefixes_blockquote_lines() {
        assert_eq!(
            convert("<blockquote><p>a</p><p>b</p></blockquote>"),
            "> a\n>\n> b"
        );
        assert_eq!(
            convert("<blockquote>a<blockquote>b</blockquote></blockquote>"),
            "> a\n>\n> > b"
        );
    }

    #[test]
    fn indents_nested_lists() {
        assert_eq!(
            convert("<ul><li>a<ul><li>b</li></ul></li><li>c</li></ul>"),
            "- a\n  - b\n- c"
        );
        assert_eq!(
            convert("<ol start=\"9\"><li>a<ul><li>b</li></ul></li><li>c</li></ol>"),
            "9. a\n   - b\n10. c"
        );
    }

    #[test]
    fn fences_code_inside_list_items() {
        assert_eq!(
            convert("<ul><li><pre><code>x\ny</code></pre></li></ul>"),
            "- ```\n  x\n  y\n  ```"
        );
    }

    #[test]
    fn invalid_origin_is_ignored() {
        let mut state = ParseState::new();
        let options = ConvertOptions::new().with_origin("not a url");
        let mut processor = MarkdownProcessor::new(options);
        let html = r#"<a href="/x">x</a>"#;
        let consumed = advance(&mut state, html, &mut processor);
        finish(&mut state, &html[consumed..], &mut processor);
        assert_eq!(processor.take_remaining(), "[x](/x)");
    }
}
