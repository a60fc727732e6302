//! Resumable event tokenizer.
//!
//! [`advance`] scans one chunk of HTML, mutating [`ParseState`] and
//! reporting element enter/exit and text events to an [`EventSink`]. When a
//! chunk ends in the middle of a construct the unconsumed suffix is left to
//! the caller, who prepends it to the next chunk. [`finish`] ends the
//! document and closes whatever is still open.
//!
//! There is no tree construction: the open-element stack doubles as the
//! node arena and is the only structural state kept.

use crate::attributes::{AttributeScan, Attributes, parse_attributes};
use crate::node::{DepthMap, ElementNode, NodeId, TextNode};
use crate::regions::DEFAULT_REGION;
use crate::tags::{Spacing, TAG_COUNT, TagId};
use memchr::{memchr, memmem};

/// Receiver of tokenizer events.
///
/// Elements are on the stack for the duration of both callbacks, so
/// `state.node(node)` is always valid inside them.
pub trait EventSink {
    /// An element was opened and pushed.
    fn node_enter(&mut self, state: &mut ParseState, node: NodeId);
    /// Buffered text was flushed at a tag boundary.
    fn text(&mut self, state: &mut ParseState, text: TextNode);
    /// An element is about to be popped.
    fn node_exit(&mut self, state: &mut ParseState, node: NodeId);
}

/// Mutable parse state carried across chunks.
#[derive(Debug, Clone)]
pub struct ParseState {
    nodes: Vec<ElementNode>,
    depth_map: DepthMap,
    text: String,
    last_was_whitespace: bool,
    strip_leading_newline: bool,
    quote: Option<char>,
    backslash: bool,
    comment: Option<ScriptComment>,
    previous: char,
    top_level_nodes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScriptComment {
    Line,
    Block,
}

impl Default for ParseState {
    fn default() -> Self {
        Self::new()
    }
}

impl ParseState {
    /// Fresh state at the start of a document.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            depth_map: [0; TAG_COUNT],
            text: String::new(),
            last_was_whitespace: true,
            strip_leading_newline: false,
            quote: None,
            backslash: false,
            comment: None,
            previous: ' ',
            top_level_nodes: 0,
        }
    }

    /// Open element by id.
    pub fn node(&self, id: NodeId) -> Option<&ElementNode> {
        self.nodes.get(id)
    }

    /// Mutable open element by id.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut ElementNode> {
        self.nodes.get_mut(id)
    }

    /// Innermost open element.
    pub fn current(&self) -> Option<&ElementNode> {
        self.nodes.last()
    }

    /// Id of the innermost open element.
    pub fn current_id(&self) -> Option<NodeId> {
        self.nodes.len().checked_sub(1)
    }

    /// Number of open elements.
    pub fn depth(&self) -> usize {
        self.nodes.len()
    }

    /// Number of open elements with the given tag.
    pub fn depth_of(&self, tag: TagId) -> u16 {
        self.depth_map[tag.index()]
    }

    /// Current open-element counters.
    pub fn depth_map(&self) -> &DepthMap {
        &self.depth_map
    }

    /// Ancestors of `id`, innermost first, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &ElementNode)> {
        self.nodes[..id.min(self.nodes.len())]
            .iter()
            .enumerate()
            .rev()
    }

    /// Innermost open element with the given tag.
    pub fn nearest(&self, tag: TagId) -> Option<NodeId> {
        if self.depth_of(tag) == 0 {
            return None;
        }
        self.nodes.iter().rposition(|node| node.tag == tag)
    }

    fn raw_text_tag(&self) -> Option<&ElementNode> {
        self.nodes.last().filter(|node| node.tag.spec().non_nesting)
    }

    fn push_text(&mut self, run: &str) {
        let raw = self.raw_text_tag().map(|node| node.tag);
        let track_quotes = raw == Some(TagId::Script);
        let preserve = raw.is_some() || self.depth_of(TagId::Pre) > 0;

        for c in run.chars() {
            if self.strip_leading_newline {
                self.strip_leading_newline = false;
                if c == '\n' {
                    continue;
                }
            }
            if track_quotes {
                self.track_quote(c);
            }
            if preserve {
                self.text.push(c);
                self.last_was_whitespace = c.is_ascii_whitespace();
            } else if c.is_ascii_whitespace() {
                if !self.last_was_whitespace {
                    self.text.push(' ');
                    self.last_was_whitespace = true;
                }
            } else {
                self.text.push(c);
                self.last_was_whitespace = false;
            }
        }
    }

    /// Follow string literals and comments so a quoted `</script>` does
    /// not end the element.
    fn track_quote(&mut self, c: char) {
        let previous = std::mem::replace(&mut self.previous, c);
        match self.comment {
            Some(ScriptComment::Line) => {
                if c == '\n' {
                    self.comment = None;
                }
                return;
            }
            Some(ScriptComment::Block) => {
                if previous == '*' && c == '/' {
                    self.comment = None;
                    self.previous = ' ';
                }
                return;
            }
            None => {}
        }
        if self.backslash {
            self.backslash = false;
            return;
        }
        match (self.quote, c) {
            (_, '\\') => self.backslash = true,
            (Some(open), c) if c == open => self.quote = None,
            // Plain string literals cannot span lines.
            (Some(open), '\n') if open != '`' => self.quote = None,
            (Some(_), _) => {}
            (None, '/') if previous == '/' => self.comment = Some(ScriptComment::Line),
            (None, '*') if previous == '/' => {
                self.comment = Some(ScriptComment::Block);
                // `/*/` does not close the comment it opens.
                self.previous = ' ';
            }
            (None, '"' | '\'' | '`') => self.quote = Some(c),
            _ => {}
        }
    }

    /// Cut buffered script text at its first closing tag when a quote never
    /// closed, returning the markup from that tag on.
    fn split_unclosed_script(&mut self) -> Option<String> {
        if self.quote.is_none() || self.raw_text_tag().map(|node| node.tag) != Some(TagId::Script)
        {
            return None;
        }
        let lower = self.text.to_ascii_lowercase();
        let end = lower.match_indices("</script").map(|(index, _)| index).find(|&index| {
            let after = index + "</script".len();
            lower.as_bytes().get(after).is_some_and(|byte| is_name_end(*byte))
                && memchr(b'>', &lower.as_bytes()[after..]).is_some()
        })?;
        self.quote = None;
        self.backslash = false;
        self.comment = None;
        Some(self.text.split_off(end))
    }

    fn next_child_index(&mut self, element: bool) -> usize {
        match self.nodes.last_mut() {
            Some(parent) => {
                parent.child_nodes += 1;
                if element {
                    parent.child_elements += 1;
                    parent.child_elements
                } else {
                    parent.child_nodes - 1
                }
            }
            None => {
                self.top_level_nodes += 1;
                self.top_level_nodes
            }
        }
    }

    fn mark_anchor_content(&mut self) {
        if let Some(anchor) = self.nearest(TagId::A) {
            self.nodes[anchor].has_content = true;
        }
    }

    fn make_text_node(&mut self, raw: &str) -> TextNode {
        let context = self.current().map(|node| node.tag);
        let decode = !matches!(
            context,
            Some(TagId::Script | TagId::Style | TagId::Noscript | TagId::Xmp)
        );
        let mut value = if decode {
            html_escape::decode_html_entities(raw).replace('\u{a0}', " ")
        } else {
            raw.to_string()
        };
        if self.raw_text_tag().is_none() && self.depth_of(TagId::Pre) == 0 {
            value = self.escape(value);
        }

        let whitespace_only = value.chars().all(char::is_whitespace);
        if !whitespace_only {
            self.mark_anchor_content();
        }
        let parent = self.current_id();
        let excluded_from_markdown = self.current().is_some_and(|node| node.excluded);
        let index = self.next_child_index(false);
        TextNode {
            value,
            parent,
            whitespace_only,
            index,
            excluded_from_markdown,
        }
    }

    fn escape(&self, value: String) -> String {
        let table = self.depth_of(TagId::Table) > 0;
        let inline_code = self.depth_of(TagId::Code) > 0
            || self.depth_of(TagId::Kbd) > 0
            || self.depth_of(TagId::Samp) > 0;
        let link = self.depth_of(TagId::A) > 0;
        let quote = self.depth_of(TagId::Blockquote) > 0;
        if !(table || inline_code || link || quote) {
            return value;
        }

        let mut escaped = String::with_capacity(value.len() + 4);
        for c in value.chars() {
            let needs_escape = match c {
                '|' => table,
                '`' => inline_code,
                '[' | ']' => link,
                '>' => quote,
                _ => false,
            };
            if needs_escape {
                escaped.push('\\');
            }
            escaped.push(c);
        }
        escaped
    }

    fn flush_text<S: EventSink + ?Sized>(&mut self, sink: &mut S) {
        if self.text.is_empty() {
            return;
        }
        let raw = std::mem::take(&mut self.text);
        let node = self.make_text_node(&raw);
        sink.text(self, node);
    }

    fn open_element<S: EventSink + ?Sized>(
        &mut self,
        name: String,
        attributes: Attributes,
        self_closing_syntax: bool,
        sink: &mut S,
    ) {
        let tag = TagId::from_name(&name);
        let spec = tag.spec();
        self.flush_text(sink);
        if let Some(target) = self.implied_close(tag) {
            self.close_to(target, sink);
        }

        self.depth_map[tag.index()] = self.depth_map[tag.index()].saturating_add(1);
        if tag == TagId::Img {
            self.mark_anchor_content();
        }
        let element_index = self.next_child_index(true);
        let (region, inherited_exclusion) = self
            .current()
            .map(|parent| (parent.region, parent.excluded))
            .unwrap_or((DEFAULT_REGION, false));
        let node = ElementNode {
            tag,
            name,
            attributes,
            parent: self.current_id(),
            depth_map: self.depth_map,
            depth: self.nodes.len() + 1,
            element_index,
            child_elements: 0,
            child_nodes: 0,
            region,
            excluded: inherited_exclusion || spec.excluded,
            has_content: false,
        };
        self.nodes.push(node);
        let id = self.nodes.len() - 1;
        log::trace!("enter <{}> at depth {}", self.nodes[id].name, id + 1);
        sink.node_enter(self, id);

        if spec.self_closing || self_closing_syntax {
            self.exit_top(sink);
        } else {
            if spec.preserves_whitespace {
                self.strip_leading_newline = true;
            }
            if spec.non_nesting {
                self.quote = None;
                self.backslash = false;
                self.comment = None;
                self.previous = ' ';
            }
        }
    }

    /// Element that opening `tag` implicitly closes, if any.
    fn implied_close(&self, tag: TagId) -> Option<NodeId> {
        use TagId as T;
        let (targets, boundaries): (&[TagId], &[TagId]) = match tag {
            T::Li => (&[T::Li], &[T::Ul, T::Ol, T::Menu, T::Table]),
            T::Dt | T::Dd => (&[T::Dt, T::Dd], &[T::Dl, T::Table]),
            T::Tr => (&[T::Tr], &[T::Table]),
            T::Td | T::Th => (&[T::Td, T::Th], &[T::Tr, T::Table]),
            T::Option => (&[T::Option], &[T::Select, T::Datalist, T::Optgroup]),
            _ if tag.spec().spacing == Spacing::BLOCK => {
                return self
                    .current()
                    .filter(|node| node.tag == T::P)
                    .and_then(|_| self.current_id());
            }
            _ => return None,
        };
        for (index, node) in self.nodes.iter().enumerate().rev() {
            if targets.contains(&node.tag) {
                return Some(index);
            }
            if boundaries.contains(&node.tag) {
                return None;
            }
        }
        None
    }

    fn close_element<S: EventSink + ?Sized>(&mut self, name: &str, sink: &mut S) {
        let tag = TagId::from_name(name);
        if tag == TagId::Br {
            // `</br>` is treated as `<br>` by browsers.
            self.open_element(name.to_string(), Attributes::new(), true, sink);
            return;
        }
        self.flush_text(sink);
        let matched = self
            .nodes
            .iter()
            .rposition(|node| node.tag == tag && (tag != TagId::Unknown || node.name == name));
        match matched {
            Some(index) => self.close_to(index, sink),
            None => log::debug!("ignoring unmatched closing tag </{name}>"),
        }
    }

    fn close_to<S: EventSink + ?Sized>(&mut self, index: NodeId, sink: &mut S) {
        while self.nodes.len() > index {
            self.exit_top(sink);
        }
    }

    fn exit_top<S: EventSink + ?Sized>(&mut self, sink: &mut S) {
        let Some(id) = self.current_id() else {
            return;
        };
        self.flush_text(sink);
        if self.nodes[id].tag == TagId::A && !self.nodes[id].has_content {
            self.synthesize_anchor_text(id, sink);
        }
        log::trace!("exit <{}>", self.nodes[id].name);
        sink.node_exit(self, id);
        if let Some(node) = self.nodes.pop() {
            let counter = &mut self.depth_map[node.tag.index()];
            *counter = counter.saturating_sub(1);
        }
    }

    fn synthesize_anchor_text<S: EventSink + ?Sized>(&mut self, id: NodeId, sink: &mut S) {
        let node = &self.nodes[id];
        let label = node
            .attribute("title")
            .filter(|value| !value.trim().is_empty())
            .or_else(|| node.attribute("aria-label"))
            .map(|value| value.trim().to_string());
        if let Some(label) = label.filter(|label| !label.is_empty()) {
            let text = self.make_text_node(&html_escape::encode_text(&label));
            sink.text(self, text);
        }
    }
}

/// Undo the contextual escapes added to text inside tables, code, links
/// and blockquotes.
pub(crate) fn unescape_markdown(text: &str) -> String {
    let mut plain = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek().is_some_and(|&next| matches!(next, '|' | '`' | '[' | ']' | '>'))
        {
            continue;
        }
        plain.push(c);
    }
    plain
}

enum Step {
    Consumed(usize),
    Literal,
    NeedMore,
}

fn is_name_end(byte: u8) -> bool {
    byte.is_ascii_whitespace() || byte == b'/' || byte == b'>'
}

/// Scan a chunk, returning how many bytes were consumed.
///
/// `chunk[consumed..]` is the remainder to prepend to the next chunk.
pub fn advance<S: EventSink + ?Sized>(state: &mut ParseState, chunk: &str, sink: &mut S) -> usize {
    let bytes = chunk.as_bytes();
    let mut pos = 0;
    while pos < bytes.len() {
        let Some(offset) = memchr(b'<', &bytes[pos..]) else {
            state.push_text(&chunk[pos..]);
            return bytes.len();
        };
        let lt = pos + offset;
        if lt > pos {
            state.push_text(&chunk[pos..lt]);
        }
        match scan_markup(state, &chunk[lt..], sink) {
            Step::Consumed(len) => pos = lt + len,
            Step::Literal => {
                state.push_text("<");
                pos = lt + 1;
            }
            Step::NeedMore => return lt,
        }
    }
    bytes.len()
}

/// End the document: flush `remainder` as text and close every open element.
pub fn finish<S: EventSink + ?Sized>(state: &mut ParseState, remainder: &str, sink: &mut S) {
    push_remainder(state, remainder);
    while let Some(tail) = state.split_unclosed_script() {
        log::debug!("unclosed quote in script, ending it at the first closing tag");
        let consumed = advance(state, &tail, sink);
        push_remainder(state, &tail[consumed..]);
    }
    state.flush_text(sink);
    while !state.nodes.is_empty() {
        state.exit_top(sink);
    }
}

fn push_remainder(state: &mut ParseState, remainder: &str) {
    if remainder.starts_with("<!--") {
        log::debug!("dropping unterminated comment at end of input");
    } else if !remainder.is_empty() {
        log::debug!("flushing unterminated markup as text: {remainder:?}");
        state.push_text(remainder);
    }
}

fn scan_markup<S: EventSink + ?Sized>(state: &mut ParseState, rest: &str, sink: &mut S) -> Step {
    let bytes = rest.as_bytes();
    if bytes.len() < 2 {
        return Step::NeedMore;
    }

    if let Some(raw) = state.raw_text_tag() {
        if bytes[1] != b'/' || state.quote.is_some() {
            return Step::Literal;
        }
        let name_start = 2;
        let Some(name_len) = bytes[name_start..].iter().position(|b| is_name_end(*b)) else {
            return Step::NeedMore;
        };
        let name = &rest[name_start..name_start + name_len];
        if !name.eq_ignore_ascii_case(&raw.name) {
            return Step::Literal;
        }
    }

    match bytes[1] {
        b'/' => scan_closing_tag(state, rest, sink),
        b'!' => scan_declaration(state, rest),
        b'?' => match memchr(b'>', bytes) {
            Some(end) => Step::Consumed(end + 1),
            None => Step::NeedMore,
        },
        b if b.is_ascii_alphabetic() => scan_opening_tag(state, rest, sink),
        _ => Step::Literal,
    }
}

fn scan_closing_tag<S: EventSink + ?Sized>(
    state: &mut ParseState,
    rest: &str,
    sink: &mut S,
) -> Step {
    let bytes = rest.as_bytes();
    if bytes.len() < 3 {
        return Step::NeedMore;
    }
    if !bytes[2].is_ascii_alphabetic() {
        // `</>` and bogus comments like `</ x>` produce nothing.
        return match memchr(b'>', bytes) {
            Some(end) => Step::Consumed(end + 1),
            None => Step::NeedMore,
        };
    }
    let Some(name_len) = bytes[2..].iter().position(|b| is_name_end(*b)) else {
        return Step::NeedMore;
    };
    let name_end = 2 + name_len;
    let Some(gt) = memchr(b'>', &bytes[name_end..]) else {
        return Step::NeedMore;
    };
    let name = rest[2..name_end].to_ascii_lowercase();
    state.close_element(&name, sink);
    Step::Consumed(name_end + gt + 1)
}

fn scan_declaration(state: &mut ParseState, rest: &str) -> Step {
    const COMMENT: &str = "<!--";
    const CDATA: &str = "<![CDATA[";
    let bytes = rest.as_bytes();

    if rest.len() < CDATA.len() && (COMMENT.starts_with(rest) || CDATA.starts_with(rest)) {
        return Step::NeedMore;
    }
    if rest.starts_with(COMMENT) {
        // `<!-->` is an empty comment.
        if bytes.get(4) == Some(&b'>') {
            return Step::Consumed(5);
        }
        return match memmem::find(&bytes[4..], b"-->") {
            Some(end) => Step::Consumed(4 + end + 3),
            None => Step::NeedMore,
        };
    }
    if rest.starts_with(CDATA) {
        return match memmem::find(&bytes[CDATA.len()..], b"]]>") {
            Some(end) => {
                let inner = &rest[CDATA.len()..CDATA.len() + end];
                state.push_text(&html_escape::encode_text(inner));
                Step::Consumed(CDATA.len() + end + 3)
            }
            None => Step::NeedMore,
        };
    }
    match memchr(b'>', bytes) {
        Some(end) => Step::Consumed(end + 1),
        None => Step::NeedMore,
    }
}

fn scan_opening_tag<S: EventSink + ?Sized>(
    state: &mut ParseState,
    rest: &str,
    sink: &mut S,
) -> Step {
    let bytes = rest.as_bytes();
    let Some(name_len) = bytes[1..].iter().position(|b| is_name_end(*b)) else {
        return Step::NeedMore;
    };
    let name_end = 1 + name_len;
    match parse_attributes(&rest[name_end..]) {
        AttributeScan::Unterminated => Step::NeedMore,
        AttributeScan::Complete {
            attributes,
            consumed,
            self_closing,
        } => {
            let name = rest[1..name_end].to_ascii_lowercase();
            state.open_element(name, attributes, self_closing, sink);
            Step::Consumed(name_end + consumed)
        }
    }
}

/// Owned event, as recorded by [`EventCollector`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Element opened.
    Enter {
        /// Tag name.
        name: String,
        /// Nesting depth.
        depth: usize,
    },
    /// Text flushed.
    Text {
        /// Text value.
        value: String,
        /// Rendering is suppressed in this context.
        excluded: bool,
    },
    /// Element closed.
    Exit {
        /// Tag name.
        name: String,
    },
}

/// Sink recording events; handy for inspecting the tokenizer.
#[derive(Debug, Default)]
pub struct EventCollector {
    /// Events in arrival order.
    pub events: Vec<Event>,
}

impl EventSink for EventCollector {
    fn node_enter(&mut self, state: &mut ParseState, node: NodeId) {
        if let Some(element) = state.node(node) {
            self.events.push(Event::Enter {
                name: element.name.clone(),
                depth: element.depth,
            });
        }
    }

    fn text(&mut self, _state: &mut ParseState, text: TextNode) {
        self.events.push(Event::Text {
            value: text.value,
            excluded: text.excluded_from_markdown,
        });
    }

    fn node_exit(&mut self, state: &mut ParseState, node: NodeId) {
        if let Some(element) = state.node(node) {
            self.events.push(Event::Exit {
                name: element.name.clone(),
            });
        }
    }
}

/// Tokenize a complete document into owned events.
pub fn tokenize(html: &str) -> Vec<Event> {
    let mut state = ParseState::new();
    let mut collector = EventCollector::default();
    let consumed = advance(&mut state, html, &mut collector);
    finish(&mut state, &html[consumed..], &mut collector);
    collector.events
}
