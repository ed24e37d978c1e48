use crate::foundation::core::{FrameIndex, FrameRange};
use crate::frames::dirty::FeedOrder;

/// Caller-supplied decision of which frames are stale.
pub trait DirtyFramePolicy: Send + Sync {
    /// Frames to regenerate. Duplicates are allowed and collapsed by the scheduler.
    fn calc_dirty_frames(&self) -> Vec<FrameIndex>;

    /// Feed order for the returned frames.
    fn feed_order(&self) -> FeedOrder {
        FeedOrder::Ascending
    }
}

/// An explicit list of dirty frames.
#[derive(Clone, Debug, Default)]
pub struct FrameList {
    frames: Vec<FrameIndex>,
    order: FeedOrder,
}

impl FrameList {
    /// Frames fed in ascending order.
    pub fn ascending(frames: impl IntoIterator<Item = FrameIndex>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            order: FeedOrder::Ascending,
        }
    }

    /// Frames fed in the order given.
    pub fn as_given(frames: impl IntoIterator<Item = FrameIndex>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            order: FeedOrder::AsGiven,
        }
    }
}

impl DirtyFramePolicy for FrameList {
    fn calc_dirty_frames(&self) -> Vec<FrameIndex> {
        self.frames.clone()
    }

    fn feed_order(&self) -> FeedOrder {
        self.order
    }
}

impl DirtyFramePolicy for FrameRange {
    fn calc_dirty_frames(&self) -> Vec<FrameIndex> {
        self.frames().collect()
    }
}

/// Policy computed by a closure at the start of every run.
pub struct FnPolicy<F> {
    f: F,
    order: FeedOrder,
}

impl<F> FnPolicy<F>
where
    F: Fn() -> Vec<FrameIndex> + Send + Sync,
{
    /// Wrap `f`; frames are fed in ascending order.
    pub fn new(f: F) -> Self {
        Self {
            f,
            order: FeedOrder::Ascending,
        }
    }

    /// Override the feed order.
    pub fn with_order(mut self, order: FeedOrder) -> Self {
        self.order = order;
        self
    }
}

impl<F> DirtyFramePolicy for FnPolicy<F>
where
    F: Fn() -> Vec<FrameIndex> + Send + Sync,
{
    fn calc_dirty_frames(&self) -> Vec<FrameIndex> {
        (self.f)()
    }

    fn feed_order(&self) -> FeedOrder {
        self.order
    }
}
