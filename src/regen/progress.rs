use crate::regen::report::{FrameFailure, RegenReport};
use std::sync::mpsc;
use std::time::{Duration, Instant};

/// Snapshot pushed to the [`ProgressReporter`] after every settled frame.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressUpdate {
    /// First line of the status text.
    pub action_title: String,
    /// Frames regenerated so far.
    pub completed: u64,
    /// Frames failed so far.
    pub failed: u64,
    /// Distinct dirty frames in the run.
    pub total: u64,
    /// Smoothed estimate of the time left, once at least one frame finished.
    pub estimated_remaining: Option<Duration>,
    /// Time since the run started.
    pub elapsed: Duration,
}

impl ProgressUpdate {
    /// Frames that reached a final per-frame state.
    pub fn processed(&self) -> u64 {
        self.completed + self.failed
    }

    /// Three-line human readable status.
    pub fn status_text(&self) -> String {
        let eta = match self.estimated_remaining {
            Some(d) => format_hms(d),
            None => "calculating...".to_string(),
        };
        format!(
            "{}\nFrame {} of {}\nEstimated time remaining: {}",
            self.action_title,
            self.processed(),
            self.total,
            eta
        )
    }
}

fn format_hms(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// What to do after a frame failure in interactive mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailureDecision {
    /// Keep feeding the remaining frames to healthy workers.
    #[default]
    Continue,
    /// Stop dispatching and end the run as cancelled.
    Cancel,
}

/// Receiver of progress updates. The UI side of a regeneration run.
///
/// Calls happen on the orchestrating thread and must return quickly; anything slow belongs on
/// the reporter's own thread (see [`ChannelProgressReporter`]).
pub trait ProgressReporter: Send + Sync {
    /// The run is about to dispatch `total` frames on `workers` slots.
    fn on_started(&self, _total: u64, _workers: usize) {}

    /// A frame settled.
    fn on_progress(&self, _update: &ProgressUpdate) {}

    /// The busy-wait grace period elapsed while the run is still going (interactive mode only).
    fn on_show_indicator(&self, _update: &ProgressUpdate) {}

    /// A frame failed. Only consulted in interactive mode.
    fn on_frame_failed(&self, _failure: &FrameFailure) -> FailureDecision {
        FailureDecision::Continue
    }

    /// The run reached its terminal state.
    fn on_finished(&self, _report: &RegenReport) {}
}

/// Reporter that ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullProgressReporter;

impl ProgressReporter for NullProgressReporter {}

/// Reporter writing progress to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogProgressReporter;

impl ProgressReporter for LogProgressReporter {
    fn on_started(&self, total: u64, workers: usize) {
        tracing::info!(total, workers, "regeneration started");
    }

    fn on_progress(&self, update: &ProgressUpdate) {
        tracing::info!(
            completed = update.completed,
            failed = update.failed,
            total = update.total,
            eta_ms = update
                .estimated_remaining
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            "regeneration progress"
        );
    }

    fn on_frame_failed(&self, failure: &FrameFailure) -> FailureDecision {
        tracing::warn!(frame = failure.frame.0, reason = %failure.reason, "frame failed");
        FailureDecision::Continue
    }

    fn on_finished(&self, report: &RegenReport) {
        tracing::info!(outcome = ?report.outcome, stats = ?report.stats, "regeneration finished");
    }
}

/// Event forwarded by [`ChannelProgressReporter`].
#[derive(Clone, Debug)]
pub enum ProgressEvent {
    /// See [`ProgressReporter::on_started`].
    Started {
        /// Distinct dirty frames.
        total: u64,
        /// Worker slots.
        workers: usize,
    },
    /// See [`ProgressReporter::on_progress`].
    Progress(ProgressUpdate),
    /// See [`ProgressReporter::on_show_indicator`].
    ShowIndicator,
    /// See [`ProgressReporter::on_frame_failed`].
    FrameFailed(FrameFailure),
    /// See [`ProgressReporter::on_finished`].
    Finished(Box<RegenReport>),
}

/// Reporter forwarding every call into an unbounded channel; never blocks the scheduler.
#[derive(Debug)]
pub struct ChannelProgressReporter {
    tx: mpsc::Sender<ProgressEvent>,
    on_failure: FailureDecision,
}

impl ChannelProgressReporter {
    /// Create a reporter and the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel();
        (
            Self {
                tx,
                on_failure: FailureDecision::Continue,
            },
            rx,
        )
    }

    /// Decision returned for every frame failure.
    pub fn with_failure_decision(mut self, decision: FailureDecision) -> Self {
        self.on_failure = decision;
        self
    }

    fn send(&self, ev: ProgressEvent) {
        // A dropped receiver just means nobody is listening anymore.
        let _ = self.tx.send(ev);
    }
}

impl ProgressReporter for ChannelProgressReporter {
    fn on_started(&self, total: u64, workers: usize) {
        self.send(ProgressEvent::Started { total, workers });
    }

    fn on_progress(&self, update: &ProgressUpdate) {
        self.send(ProgressEvent::Progress(update.clone()));
    }

    fn on_show_indicator(&self, _update: &ProgressUpdate) {
        self.send(ProgressEvent::ShowIndicator);
    }

    fn on_frame_failed(&self, failure: &FrameFailure) -> FailureDecision {
        self.send(ProgressEvent::FrameFailed(failure.clone()));
        self.on_failure
    }

    fn on_finished(&self, report: &RegenReport) {
        self.send(ProgressEvent::Finished(Box::new(report.clone())));
    }
}

/// Remaining-time estimate from an exponential moving average of the interval between
/// completions. With several workers the interval already reflects their combined throughput.
#[derive(Clone, Debug)]
pub(crate) struct EtaEstimator {
    alpha: f64,
    last_mark: Instant,
    ema_secs: Option<f64>,
}

impl EtaEstimator {
    pub(crate) fn new(start: Instant, alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(f64::MIN_POSITIVE, 1.0),
            last_mark: start,
            ema_secs: None,
        }
    }

    pub(crate) fn record(&mut self, now: Instant) {
        let interval = now.saturating_duration_since(self.last_mark).as_secs_f64();
        self.last_mark = now;
        self.ema_secs = Some(match self.ema_secs {
            None => interval,
            Some(prev) => self.alpha * interval + (1.0 - self.alpha) * prev,
        });
    }

    pub(crate) fn estimate(&self, remaining_frames: u64) -> Option<Duration> {
        let per_frame = self.ema_secs?;
        Duration::try_from_secs_f64(per_frame * remaining_frames as f64).ok()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/regen/progress.rs"]
mod tests;
