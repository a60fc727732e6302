//! Include/exclude filtering by selector or tag.

use crate::selector::{Selector, SelectorError, parse_all};
use mdrift_core::regions::DEFAULT_REGION;
use mdrift_core::{HookContext, Plugin, RegionId, RegionState, TagId};
use serde::Deserialize;

/// Filter configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    /// Keep only subtrees matching one of these selectors. Empty keeps
    /// everything.
    #[serde(default)]
    pub include: Vec<String>,
    /// Drop subtrees matching one of these selectors.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Drop every element with one of these tags.
    #[serde(default)]
    pub exclude_tags: Vec<TagId>,
}

/// Drops excluded subtrees and, with include selectors, everything outside
/// the included ones. Exclusion wins over inclusion.
#[derive(Debug)]
pub struct FilterPlugin {
    include: Vec<Selector>,
    exclude: Vec<Selector>,
    exclude_tags: Vec<TagId>,
    outside: Option<RegionId>,
}

impl FilterPlugin {
    /// Compile the configured selectors.
    pub fn new(options: FilterOptions) -> Result<Self, SelectorError> {
        Ok(Self {
            include: parse_all(&options.include)?,
            exclude: parse_all(&options.exclude)?,
            exclude_tags: options.exclude_tags,
            outside: None,
        })
    }

    /// Exclude-only filter.
    pub fn excluding<S: AsRef<str>>(selectors: &[S]) -> Result<Self, SelectorError> {
        Ok(Self {
            include: Vec::new(),
            exclude: parse_all(selectors)?,
            exclude_tags: Vec::new(),
            outside: None,
        })
    }

    /// Include-only filter.
    pub fn including<S: AsRef<str>>(selectors: &[S]) -> Result<Self, SelectorError> {
        Ok(Self {
            include: parse_all(selectors)?,
            exclude: Vec::new(),
            exclude_tags: Vec::new(),
            outside: None,
        })
    }
}

impl Plugin for FilterPlugin {
    fn on_node_enter(&mut self, cx: &mut HookContext<'_>) -> Option<String> {
        let node = cx.node()?;
        if node.excluded {
            return None;
        }
        if self.exclude_tags.contains(&node.tag)
            || self.exclude.iter().any(|selector| selector.matches(node))
        {
            log::trace!("excluding <{}>", node.name);
            cx.exclude();
            return None;
        }
        if self.include.is_empty() {
            return None;
        }

        let top_level = node.parent.is_none();
        let included = self.include.iter().any(|selector| selector.matches(node));
        if top_level {
            match self.outside {
                Some(outside) => cx.assign_region_to_open_elements(outside),
                None => self.outside = Some(cx.open_region(RegionState::Excluded)),
            }
        }
        if included {
            let already_included = cx.region().is_some_and(|region| {
                region != DEFAULT_REGION && cx.region_state(region) == RegionState::Included
            });
            if !already_included {
                cx.open_region(RegionState::Included);
            }
        }
        None
    }
}
