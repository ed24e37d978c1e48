use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Shared flag for cooperative cancellation of a regeneration run.
///
/// Clones observe the same state. Cancellation is advisory: the scheduler stops dispatching new
/// frames and renderers that support abort may poll it between units of work.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token in the non-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Return `true` once [`CancellationToken::cancel`] was called on this token or any clone.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/regen/cancel.rs"]
mod tests;
