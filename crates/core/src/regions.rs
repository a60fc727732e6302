//! Region buffers.
//!
//! Output is an append-only log of segments, each tagged with the region
//! that produced it. A region's inclusion state can change after its text
//! was written; only the rendering step looks at the states. Segments are
//! released in log order, so a `Pending` region holds back everything
//! written after it until it is decided.

use std::collections::VecDeque;

/// Region identifier. Region 0 is the default region.
pub type RegionId = u32;

/// The always-included default region.
pub const DEFAULT_REGION: RegionId = 0;

/// Inclusion state of a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionState {
    /// Rendered.
    Included,
    /// Dropped.
    Excluded,
    /// Not decided yet; rendered if still pending when the document ends.
    Pending,
}

#[derive(Debug)]
struct Segment {
    region: RegionId,
    text: String,
}

/// Segment log plus region states.
#[derive(Debug)]
pub struct Regions {
    states: Vec<RegionState>,
    segments: VecDeque<Segment>,
}

impl Default for Regions {
    fn default() -> Self {
        Self::new()
    }
}

impl Regions {
    /// Log with only the default region.
    pub fn new() -> Self {
        Self {
            states: vec![RegionState::Included],
            segments: VecDeque::new(),
        }
    }

    /// Open a new region.
    pub fn open(&mut self, state: RegionState) -> RegionId {
        self.states.push(state);
        (self.states.len() - 1) as RegionId
    }

    /// Current state; unknown ids read as included.
    pub fn state(&self, region: RegionId) -> RegionState {
        self.states
            .get(region as usize)
            .copied()
            .unwrap_or(RegionState::Included)
    }

    /// Change a region's state. The default region cannot be changed.
    pub fn set_state(&mut self, region: RegionId, state: RegionState) {
        if region == DEFAULT_REGION {
            log::debug!("ignoring state change of the default region to {state:?}");
            return;
        }
        match self.states.get_mut(region as usize) {
            Some(slot) => *slot = state,
            None => log::debug!("ignoring state change of unknown region {region}"),
        }
    }

    /// Append text to a region.
    pub fn write(&mut self, region: RegionId, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.segments.back_mut() {
            Some(last) if last.region == region => last.text.push_str(text),
            _ => self.segments.push_back(Segment {
                region,
                text: text.to_string(),
            }),
        }
    }

    /// Release segments whose region is decided, in log order.
    ///
    /// Stops at the first pending segment unless `finished`, in which case
    /// pending regions count as included.
    pub fn drain_settled(&mut self, finished: bool, mut emit: impl FnMut(&str)) {
        while let Some(front) = self.segments.front() {
            let state = self.state(front.region);
            if state == RegionState::Pending && !finished {
                break;
            }
            if let Some(segment) = self.segments.pop_front()
                && state != RegionState::Excluded
            {
                emit(&segment.text);
            }
        }
    }

    /// Whether any text is held back.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(regions: &mut Regions, finished: bool) -> String {
        let mut out = String::new();
        regions.drain_settled(finished, |text| out.push_str(text));
        out
    }

    #[test]
    fn concatenates_included_segments_in_order() {
        let mut regions = Regions::new();
        let nav = regions.open(RegionState::Included);
        regions.write(DEFAULT_REGION, "a");
        regions.write(nav, "b");
        regions.write(DEFAULT_REGION, "c");
        regions.set_state(nav, RegionState::Excluded);
        assert_eq!(drain(&mut regions, true), "ac");
        assert!(regions.is_empty());
    }

    #[test]
    fn pending_region_holds_back_later_output() {
        let mut regions = Regions::new();
        let pending = regions.open(RegionState::Pending);
        regions.write(DEFAULT_REGION, "head ");
        regions.write(pending, "maybe ");
        regions.write(DEFAULT_REGION, "tail");
        assert_eq!(drain(&mut regions, false), "head ");

        regions.set_state(pending, RegionState::Included);
        assert_eq!(drain(&mut regions, false), "maybe tail");
    }

    #[test]
    fn pending_counts_as_included_at_end() {
        let mut regions = Regions::new();
        let pending = regions.open(RegionState::Pending);
        regions.write(pending, "kept");
        assert_eq!(drain(&mut regions, false), "");
        assert_eq!(drain(&mut regions, true), "kept");
    }

    #[test]
    fn default_region_stays_included() {
        let mut regions = Regions::new();
        regions.set_state(DEFAULT_REGION, RegionState::Excluded);
        regions.set_state(42, RegionState::Excluded);
        assert_eq!(regions.state(DEFAULT_REGION), RegionState::Included);
        regions.write(DEFAULT_REGION, "x");
        assert_eq!(drain(&mut regions, false), "x");
    }
}
