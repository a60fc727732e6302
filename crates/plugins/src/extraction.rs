//! Selector-driven element extraction.

use crate::selector::{Selector, SelectorError, parse_all};
use mdrift_core::attributes::Attributes;
use mdrift_core::{HookContext, NodeId, Plugin, TextNode};
use serde::Serialize;

/// An element matched by an [`ExtractionPlugin`] selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedElement {
    /// The selector that matched, as written.
    pub selector: String,
    /// Lowercase tag name.
    pub tag_name: String,
    /// The element's attributes.
    pub attributes: Attributes,
    /// Trimmed text of the element and its descendants.
    pub text_content: String,
}

struct ActiveMatch {
    node: NodeId,
    selector: usize,
    element: ExtractedElement,
}

/// Reports every element matching one of its selectors, with its text,
/// when the element closes.
///
/// The conversion output is not affected.
pub struct ExtractionPlugin {
    selectors: Vec<Selector>,
    active: Vec<ActiveMatch>,
    callback: Box<dyn FnMut(ExtractedElement)>,
}

impl ExtractionPlugin {
    /// Compile `selectors`; `callback` receives each extracted element.
    pub fn new<S: AsRef<str>>(
        selectors: &[S],
        callback: impl FnMut(ExtractedElement) + 'static,
    ) -> Result<Self, SelectorError> {
        Ok(Self {
            selectors: parse_all(selectors)?,
            active: Vec::new(),
            callback: Box::new(callback),
        })
    }
}

impl Plugin for ExtractionPlugin {
    fn on_node_enter(&mut self, cx: &mut HookContext<'_>) -> Option<String> {
        let (Some(id), Some(node)) = (cx.node_id(), cx.node()) else {
            return None;
        };
        for (index, selector) in self.selectors.iter().enumerate() {
            if selector.matches(node) {
                self.active.push(ActiveMatch {
                    node: id,
                    selector: index,
                    element: ExtractedElement {
                        selector: selector.as_str().to_string(),
                        tag_name: node.name.clone(),
                        attributes: node.attributes.clone(),
                        text_content: String::new(),
                    },
                });
            }
        }
        None
    }

    fn process_text_node(&mut self, text: &TextNode, _cx: &mut HookContext<'_>) -> Option<String> {
        // Every active match encloses the text: matches are dropped when
        // their element closes.
        for active in &mut self.active {
            active.element.text_content.push_str(&text.value);
        }
        None
    }

    fn on_node_exit(&mut self, cx: &mut HookContext<'_>) -> Option<String> {
        let id = cx.node_id()?;
        let first = self.active.iter().position(|active| active.node == id)?;
        let mut finished: Vec<ActiveMatch> = self.active.drain(first..).collect();
        finished.sort_by_key(|active| active.selector);
        for mut active in finished {
            active.element.text_content = active.element.text_content.trim().to_string();
            log::trace!("extracted <{}> for {}", active.element.tag_name, active.element.selector);
            (self.callback)(active.element);
        }
        None
    }
}
