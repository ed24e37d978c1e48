use crate::foundation::core::FrameIndex;
use std::collections::{BTreeSet, HashSet, VecDeque};

/// Order in which dirty frames are fed to workers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedOrder {
    /// Ascending frame index.
    #[default]
    Ascending,
    /// The order produced by the dirty-frame policy (duplicates keep their first position).
    AsGiven,
}

/// Deduplicated queue of frames awaiting regeneration plus the frames currently in flight.
///
/// Owned by the orchestrating thread; not meant for concurrent access.
#[derive(Clone, Debug, Default)]
pub struct DirtyFrameSet {
    queue: VecDeque<FrameIndex>,
    in_flight: BTreeSet<FrameIndex>,
    total: usize,
}

impl DirtyFrameSet {
    /// Build the set from the caller's frame list.
    pub fn new(frames: impl IntoIterator<Item = FrameIndex>, order: FeedOrder) -> Self {
        let mut seen = HashSet::new();
        let mut list = frames
            .into_iter()
            .filter(|f| seen.insert(*f))
            .collect::<Vec<_>>();
        if order == FeedOrder::Ascending {
            list.sort_unstable();
        }
        Self {
            total: list.len(),
            queue: list.into(),
            in_flight: BTreeSet::new(),
        }
    }

    /// Claim the next frame, moving it to the in-flight subset.
    pub fn take_next(&mut self) -> Option<FrameIndex> {
        let f = self.queue.pop_front()?;
        self.in_flight.insert(f);
        Some(f)
    }

    /// Mark an in-flight frame as settled (completed, failed or cancelled).
    ///
    /// Returns `false` when `frame` was not in flight.
    pub fn settle(&mut self, frame: FrameIndex) -> bool {
        self.in_flight.remove(&frame)
    }

    /// Frames not yet dispatched.
    pub fn remaining_count(&self) -> usize {
        self.queue.len()
    }

    /// Frames dispatched but not yet settled.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Iterate the in-flight frames in ascending order.
    pub fn in_flight(&self) -> impl Iterator<Item = FrameIndex> + '_ {
        self.in_flight.iter().copied()
    }

    /// Number of distinct frames the set was built with.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Return `true` when the set held no frame at all.
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Return `true` when every frame has been dispatched.
    pub fn is_exhausted(&self) -> bool {
        self.queue.is_empty()
    }

    /// Remove and return the frames that were never dispatched.
    pub fn drain_remaining(&mut self) -> Vec<FrameIndex> {
        self.queue.drain(..).collect()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/frames/dirty.rs"]
mod tests;
