use crate::document::source::ImageDocument;
use crate::foundation::error::{RegenError, RegenResult};
use crate::regen::cancel::CancellationToken;
use crate::regen::report::RegenReport;
use crate::regen::scheduler::{ExecutionContext, RegenerationScheduler};
use std::thread::JoinHandle;

/// A regeneration running on its own orchestrator thread.
///
/// Dropping the handle detaches the run; it keeps going until it reaches its terminal state.
#[derive(Debug)]
pub struct RegenerationHandle {
    cancel: CancellationToken,
    thread: JoinHandle<RegenReport>,
}

impl RegenerationHandle {
    /// Ask the run to stop. In-flight frames finish first.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token observed by the run.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Return `true` once the run reached its terminal state.
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Block until the run finishes and return its report.
    pub fn join(self) -> RegenResult<RegenReport> {
        self.thread
            .join()
            .map_err(|_| RegenError::Other(anyhow::anyhow!("regeneration thread panicked")))
    }
}

impl<D: ImageDocument> RegenerationScheduler<D> {
    /// Run [`RegenerationScheduler::regenerate_range`] on a dedicated thread.
    pub fn spawn(self, ctx: ExecutionContext) -> RegenResult<RegenerationHandle> {
        let cancel = ctx.cancellation().clone();
        let thread = std::thread::Builder::new()
            .name("regen-orchestrator".to_string())
            .spawn(move || self.regenerate_range(&ctx))
            .map_err(|e| {
                RegenError::Other(anyhow::Error::new(e).context("spawn regeneration thread"))
            })?;
        Ok(RegenerationHandle { cancel, thread })
    }
}
