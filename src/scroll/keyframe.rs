//! Timestamped snapshots of the sounding pipes.

use crate::midi::NoteId;
use std::collections::{BTreeMap, BTreeSet};

/// Which pipes are open from `time_us` until the next keyframe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyframe {
    /// Microseconds since the start of the piece.
    pub time_us: u64,
    /// Distinct sounding pipes.
    pub active: BTreeSet<NoteId>,
}

/// Collects one snapshot per timestamp.
///
/// Recording twice at the same time replaces the earlier snapshot, so the
/// state after the last event at a timestamp is what gets played.
#[derive(Debug, Clone, Default)]
pub struct KeyframeAssembler {
    candidates: BTreeMap<u64, BTreeSet<NoteId>>,
}

impl KeyframeAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the active set at `time_us`, replacing any earlier record
    /// for the same time.
    pub fn record(&mut self, time_us: u64, active: BTreeSet<NoteId>) {
        self.candidates.insert(time_us, active);
    }

    /// Keyframes in ascending time order.
    pub fn finish(self) -> Vec<Keyframe> {
        self.candidates
            .into_iter()
            .map(|(time_us, active)| Keyframe { time_us, active })
            .collect()
    }
}
