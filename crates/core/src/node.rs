use crate::attributes::Attributes;
use crate::regions::RegionId;
use crate::tags::{TAG_COUNT, TagId};

/// Open-element counters indexed by [`TagId`].
pub type DepthMap = [u16; TAG_COUNT];

/// Index of an element in the open-element stack.
pub type NodeId = usize;

/// An open element.
///
/// Elements live on the parser's stack; their [`NodeId`] is their stack
/// index, so the parent of element `n` is always `n - 1`.
#[derive(Debug, Clone)]
pub struct ElementNode {
    /// Tag id, [`TagId::Unknown`] for unrecognized names.
    pub tag: TagId,
    /// Lowercase tag name as written.
    pub name: String,
    /// Parsed attributes.
    pub attributes: Attributes,
    /// Parent element, `None` at the top level.
    pub parent: Option<NodeId>,
    /// Open-element counters at creation time, including this element.
    pub depth_map: DepthMap,
    /// Nesting depth, 1 for top-level elements.
    pub depth: usize,
    /// 1-based position among the parent's element children.
    pub element_index: usize,
    /// Element children seen so far.
    pub child_elements: usize,
    /// Element and text children seen so far.
    pub child_nodes: usize,
    /// Region receiving this element's output.
    pub region: RegionId,
    /// No Markdown is produced for this element or its subtree.
    pub excluded: bool,
    /// Non-whitespace text or an image was seen inside (anchors only).
    pub has_content: bool,
}

impl ElementNode {
    /// Number of open `tag` elements when this one was created.
    pub fn depth_of(&self, tag: TagId) -> u16 {
        self.depth_map[tag.index()]
    }

    /// Attribute value by lowercase name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Whitespace-separated classes.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        crate::attributes::classes(&self.attributes)
    }
}

/// A run of text flushed at a tag boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextNode {
    /// Decoded, contextually escaped text.
    pub value: String,
    /// Enclosing element.
    pub parent: Option<NodeId>,
    /// Only whitespace.
    pub whitespace_only: bool,
    /// Position within the parent's child sequence.
    pub index: usize,
    /// Inside a raw-text or excluded context; plugins still see it.
    pub excluded_from_markdown: bool,
}
