//! Plugin hooks.
//!
//! Plugins observe every tokenizer event and may rewrite text, exclude
//! subtrees, or move output into regions whose inclusion is decided later.

use crate::node::{ElementNode, NodeId, TextNode};
use crate::regions::{RegionId, RegionState, Regions};
use crate::tags::TagId;
use crate::tokenizer::ParseState;

/// Transformation hooks invoked for every event, in registration order.
///
/// On enter, plugins run before the element's own Markdown is written; on
/// exit, after it; for text, before the text is written. A string returned
/// from [`Plugin::on_node_enter`] or [`Plugin::on_node_exit`] is written as
/// a separate block in the default region.
pub trait Plugin {
    /// An element was opened.
    fn on_node_enter(&mut self, cx: &mut HookContext<'_>) -> Option<String> {
        let _ = cx;
        None
    }

    /// Text is about to be written. Returning a string replaces it.
    ///
    /// Called for text in excluded contexts as well.
    fn process_text_node(&mut self, text: &TextNode, cx: &mut HookContext<'_>) -> Option<String> {
        let _ = (text, cx);
        None
    }

    /// An element is about to be closed.
    fn on_node_exit(&mut self, cx: &mut HookContext<'_>) -> Option<String> {
        let _ = cx;
        None
    }
}

/// View of the parse handed to plugin hooks.
pub struct HookContext<'a> {
    state: &'a mut ParseState,
    regions: &'a mut Regions,
    node: Option<NodeId>,
}

impl<'a> HookContext<'a> {
    pub(crate) fn new(
        state: &'a mut ParseState,
        regions: &'a mut Regions,
        node: Option<NodeId>,
    ) -> Self {
        Self {
            state,
            regions,
            node,
        }
    }

    /// Id of the current element (the text's parent for text hooks).
    pub fn node_id(&self) -> Option<NodeId> {
        self.node
    }

    /// The current element.
    pub fn node(&self) -> Option<&ElementNode> {
        self.node.and_then(|id| self.state.node(id))
    }

    /// Any open element.
    pub fn node_at(&self, id: NodeId) -> Option<&ElementNode> {
        self.state.node(id)
    }

    /// Ancestors of the current element, innermost first.
    pub fn ancestors(&self) -> impl Iterator<Item = (NodeId, &ElementNode)> {
        let end = self.node.unwrap_or(0);
        self.state.ancestors(end)
    }

    /// Number of open elements with `tag`.
    pub fn depth_of(&self, tag: TagId) -> u16 {
        self.state.depth_of(tag)
    }

    /// Number of open elements.
    pub fn depth(&self) -> usize {
        self.state.depth()
    }

    /// Drop the current element and its subtree from the Markdown output.
    ///
    /// Output already written for the element is not retracted.
    pub fn exclude(&mut self) {
        if let Some(node) = self.node.and_then(|id| self.state.node_mut(id)) {
            node.excluded = true;
        }
    }

    /// Region of the current element.
    pub fn region(&self) -> Option<RegionId> {
        self.node().map(|node| node.region)
    }

    /// Open a region and assign it to the current element and its future
    /// descendants.
    pub fn open_region(&mut self, state: RegionState) -> RegionId {
        let region = self.regions.open(state);
        if let Some(node) = self.node.and_then(|id| self.state.node_mut(id)) {
            node.region = region;
        }
        region
    }

    /// Assign `region` to every open element, so that everything written
    /// from here on (until those elements close) lands in it.
    pub fn assign_region_to_open_elements(&mut self, region: RegionId) {
        for id in 0..self.state.depth() {
            if let Some(node) = self.state.node_mut(id) {
                node.region = region;
            }
        }
    }

    /// Change a region's inclusion state.
    pub fn set_region(&mut self, region: RegionId, state: RegionState) {
        self.regions.set_state(region, state);
    }

    /// Current inclusion state of a region.
    pub fn region_state(&self, region: RegionId) -> RegionState {
        self.regions.state(region)
    }
}
