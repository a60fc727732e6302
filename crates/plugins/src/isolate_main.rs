//! Main-content isolation.

use mdrift_core::{HookContext, Plugin, RegionId, RegionState, TagId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Neither `main` nor an `h1` seen yet; output is held back.
    Searching,
    /// Inside or after the first `main`.
    Main,
    /// Keeping from the first `h1`; a later `main` still wins.
    Heading { kept: RegionId },
    /// A footer ended the `h1` section.
    Footer { dropped: RegionId },
}

/// Keeps only the main content of a page.
///
/// With a `<main>` element, only its content is kept. Otherwise content
/// from the first `<h1>` up to the next `<footer>` is kept. A page with
/// neither is kept whole.
#[derive(Debug)]
pub struct IsolateMainPlugin {
    mode: Mode,
    outside: Option<RegionId>,
}

impl Default for IsolateMainPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl IsolateMainPlugin {
    /// Plugin in its initial state.
    pub fn new() -> Self {
        Self {
            mode: Mode::Searching,
            outside: None,
        }
    }

    fn exclude_outside(&self, cx: &mut HookContext<'_>) {
        if let Some(outside) = self.outside {
            cx.set_region(outside, RegionState::Excluded);
        }
    }
}

impl Plugin for IsolateMainPlugin {
    fn on_node_enter(&mut self, cx: &mut HookContext<'_>) -> Option<String> {
        let (tag, top_level) = {
            let node = cx.node()?;
            (node.tag, node.parent.is_none())
        };

        if top_level {
            match self.mode {
                Mode::Searching | Mode::Main => match self.outside {
                    Some(outside) => cx.assign_region_to_open_elements(outside),
                    None => self.outside = Some(cx.open_region(RegionState::Pending)),
                },
                Mode::Heading { kept } => cx.assign_region_to_open_elements(kept),
                Mode::Footer { dropped } => cx.assign_region_to_open_elements(dropped),
            }
        }

        match (tag, self.mode) {
            (TagId::Main, Mode::Searching | Mode::Heading { .. }) => {
                log::debug!("isolating <main>");
                self.exclude_outside(cx);
                if let Mode::Heading { kept } = self.mode {
                    cx.set_region(kept, RegionState::Excluded);
                }
                cx.open_region(RegionState::Included);
                self.mode = Mode::Main;
            }
            (TagId::H1, Mode::Searching) => {
                log::debug!("isolating from the first <h1>");
                self.exclude_outside(cx);
                let kept = cx.open_region(RegionState::Pending);
                cx.assign_region_to_open_elements(kept);
                self.mode = Mode::Heading { kept };
            }
            (TagId::Footer, Mode::Heading { kept }) => {
                let dropped = cx.open_region(RegionState::Excluded);
                cx.assign_region_to_open_elements(dropped);
                cx.set_region(kept, RegionState::Included);
                self.mode = Mode::Footer { dropped };
            }
            _ => {}
        }
        None
    }
}
