use crate::foundation::core::FrameIndex;
use std::time::Duration;

/// Terminal result of one regeneration run. Assigned exactly once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegenOutcome {
    /// Every dirty frame was regenerated.
    Complete,
    /// The run was stopped early on request.
    Cancelled,
    /// A working copy could not be created, or frames failed to render.
    Failed,
}

/// Who asked the run to stop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// The caller or the user cancelled through the cancellation token.
    User,
    /// A renderer reported a cancelled frame.
    Renderer,
    /// The progress reporter chose to cancel after a frame failure.
    AfterFailure,
}

/// One frame whose renderer reported an error.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameFailure {
    /// Failed frame.
    pub frame: FrameIndex,
    /// Worker slot the frame ran on.
    pub slot: usize,
    /// Renderer-provided reason.
    pub reason: String,
}

/// Why a run ended in [`RegenOutcome::Failed`].
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunFailure {
    /// Not even one working copy could be created.
    CloneFailed {
        /// Last copy error.
        reason: String,
    },
    /// No renderer could be created for any working copy.
    RendererUnavailable {
        /// Last factory error.
        reason: String,
    },
    /// A frame failed to render (the first one, when several failed).
    RenderFailed {
        /// Failed frame.
        frame: FrameIndex,
        /// Renderer-provided reason.
        reason: String,
    },
    /// The source document could not be read.
    Internal {
        /// Underlying error.
        reason: String,
    },
}

/// Frame and worker counters for a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RegenStats {
    /// Distinct dirty frames.
    pub frames_total: u64,
    /// Frames regenerated successfully.
    pub frames_completed: u64,
    /// Frames whose renderer reported an error.
    pub frames_failed: u64,
    /// Frames the renderer reported as cancelled.
    pub frames_cancelled: u64,
    /// Frames never dispatched (run stopped or no healthy worker left).
    pub frames_skipped: u64,
    /// Worker slots used.
    pub workers: usize,
}

/// Everything a caller learns about a finished run.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RegenReport {
    /// Terminal state.
    pub outcome: RegenOutcome,
    /// Set when the run was cancelled.
    pub cancel_reason: Option<CancelReason>,
    /// Set when the run failed.
    pub failure: Option<RunFailure>,
    /// Per-frame failures, in the order they were reported.
    pub failures: Vec<FrameFailure>,
    /// Successfully regenerated frames, in completion order.
    pub completed_frames: Vec<FrameIndex>,
    /// Frames that were never dispatched.
    pub skipped_frames: Vec<FrameIndex>,
    /// Counters.
    pub stats: RegenStats,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

impl RegenReport {
    pub(crate) fn empty(outcome: RegenOutcome) -> Self {
        Self {
            outcome,
            cancel_reason: None,
            failure: None,
            failures: Vec::new(),
            completed_frames: Vec::new(),
            skipped_frames: Vec::new(),
            stats: RegenStats::default(),
            elapsed: Duration::ZERO,
        }
    }

    /// Return `true` for [`RegenOutcome::Complete`].
    pub fn is_complete(&self) -> bool {
        self.outcome == RegenOutcome::Complete
    }

    /// Frames that failed to render.
    pub fn failed_frames(&self) -> impl Iterator<Item = FrameIndex> + '_ {
        self.failures.iter().map(|f| f.frame)
    }
}
