use crate::budget::memory::{MemoryBudgetEstimator, MemoryProbe};
use crate::document::cloner::DocumentCloner;
use crate::document::source::{ImageDocument, SourceDocument};
use crate::foundation::core::{FrameIndex, Region};
use crate::foundation::error::{RegenError, RegenResult};
use crate::frames::dirty::DirtyFrameSet;
use crate::frames::policy::DirtyFramePolicy;
use crate::regen::cancel::CancellationToken;
use crate::regen::opts::RegenOpts;
use crate::regen::progress::{
    EtaEstimator, FailureDecision, NullProgressReporter, ProgressReporter, ProgressUpdate,
};
use crate::regen::report::{
    CancelReason, FrameFailure, RegenOutcome, RegenReport, RegenStats, RunFailure,
};
use crate::render::renderer::RendererFactory;
use crate::render::worker::{SlotEvent, SlotResult, SlotState, SlotWorker, WorkerSlot};
use std::sync::{Arc, mpsc};
use std::time::Instant;

/// What a caller hands to [`RegenerationScheduler::regenerate_range`]: where cancellation
/// requests come from and where progress goes.
#[derive(Clone)]
pub struct ExecutionContext {
    cancel: CancellationToken,
    reporter: Arc<dyn ProgressReporter>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            cancel: CancellationToken::new(),
            reporter: Arc::new(NullProgressReporter),
        }
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}

impl ExecutionContext {
    /// Context with a fresh cancellation token and no progress reporting.
    pub fn new() -> Self {
        Self::default()
    }

    /// Send progress to `reporter`.
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Observe `token` for cancellation requests.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token whose cancellation stops the run.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Progress receiver.
    pub fn reporter(&self) -> &dyn ProgressReporter {
        self.reporter.as_ref()
    }
}

/// Lifecycle of one run. `Terminal` is final.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SchedulerPhase {
    Idle,
    Initializing,
    Running,
    Completing,
    Cancelling,
    Terminal(RegenOutcome),
}

#[derive(Debug)]
pub(crate) struct PhaseTracker {
    phase: SchedulerPhase,
}

impl PhaseTracker {
    pub(crate) fn new() -> Self {
        Self {
            phase: SchedulerPhase::Idle,
        }
    }

    pub(crate) fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    /// Move to `next`. Refused once a terminal phase was reached.
    pub(crate) fn enter(&mut self, next: SchedulerPhase) -> bool {
        if let SchedulerPhase::Terminal(outcome) = self.phase {
            tracing::debug!(?outcome, ?next, "ignoring transition out of terminal phase");
            return false;
        }
        tracing::debug!(from = ?self.phase, to = ?next, "scheduler phase");
        self.phase = next;
        true
    }

    pub(crate) fn terminal(&self) -> Option<RegenOutcome> {
        match self.phase {
            SchedulerPhase::Terminal(outcome) => Some(outcome),
            _ => None,
        }
    }
}

/// Regenerates dirty frames of a document on a memory-bounded set of parallel workers.
///
/// Each run computes the dirty frames through the injected policy, decides how many working
/// copies of the source document it can afford, binds one renderer to each copy and keeps every
/// worker fed until the frames run out, the run is cancelled, or (in batch mode) a frame fails.
/// All scheduling state lives on the calling thread; workers only talk back through a
/// single-consumer event channel.
pub struct RegenerationScheduler<D> {
    source: SourceDocument<D>,
    policy: Arc<dyn DirtyFramePolicy>,
    factory: Arc<dyn RendererFactory<D>>,
    opts: RegenOpts,
    estimator: MemoryBudgetEstimator,
    cloner: DocumentCloner,
}

impl<D: ImageDocument> RegenerationScheduler<D> {
    /// Create a scheduler. Memory is probed from the operating system unless
    /// [`RegenerationScheduler::with_memory_probe`] overrides it.
    pub fn new(
        source: SourceDocument<D>,
        policy: Arc<dyn DirtyFramePolicy>,
        factory: Arc<dyn RendererFactory<D>>,
        opts: RegenOpts,
    ) -> RegenResult<Self> {
        opts.validate()?;
        Ok(Self {
            source,
            policy,
            factory,
            estimator: MemoryBudgetEstimator::system(opts.memory),
            opts,
            cloner: DocumentCloner,
        })
    }

    /// Use `probe` for the available-memory figure.
    pub fn with_memory_probe(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.estimator = MemoryBudgetEstimator::new(self.opts.memory, probe);
        self
    }

    /// Restrict regeneration to `roi`. An empty region regenerates whole frames.
    pub fn set_region_of_interest(&mut self, roi: Region) {
        self.opts.region_of_interest = roi;
    }

    /// See [`RegenerationScheduler::set_region_of_interest`].
    pub fn region_of_interest(&self) -> &Region {
        &self.opts.region_of_interest
    }

    /// Toggle unattended mode.
    pub fn set_batch_mode(&mut self, value: bool) {
        self.opts.batch_mode = value;
    }

    /// See [`RegenerationScheduler::set_batch_mode`].
    pub fn batch_mode(&self) -> bool {
        self.opts.batch_mode
    }

    /// Effective options.
    pub fn opts(&self) -> &RegenOpts {
        &self.opts
    }

    /// The authoritative document.
    pub fn source(&self) -> &SourceDocument<D> {
        &self.source
    }

    /// Regenerate all dirty frames, blocking until the run reaches its terminal state.
    ///
    /// Never returns an error: per-frame failures and setup problems are reported in the
    /// returned [`RegenReport`].
    #[tracing::instrument(
        skip_all,
        fields(title = %self.opts.action_title, batch = self.opts.batch_mode)
    )]
    pub fn regenerate_range(&self, ctx: &ExecutionContext) -> RegenReport {
        let started = Instant::now();
        let mut phase = PhaseTracker::new();
        phase.enter(SchedulerPhase::Initializing);

        let dirty = DirtyFrameSet::new(self.policy.calc_dirty_frames(), self.policy.feed_order());
        let report = if dirty.is_empty() {
            tracing::info!("no dirty frames");
            phase.enter(SchedulerPhase::Terminal(RegenOutcome::Complete));
            RegenReport::empty(RegenOutcome::Complete)
        } else if ctx.cancel.is_cancelled() {
            tracing::info!("cancelled before start");
            let mut r = setup_report(dirty, RegenOutcome::Cancelled, None, started);
            r.cancel_reason = Some(CancelReason::User);
            phase.enter(SchedulerPhase::Terminal(RegenOutcome::Cancelled));
            r
        } else {
            match self.prepare_workers(&dirty) {
                Ok(workers) => self.run_workers(workers, dirty, ctx, phase, started),
                Err(failure) => {
                    tracing::warn!(?failure, "regeneration could not start");
                    phase.enter(SchedulerPhase::Terminal(RegenOutcome::Failed));
                    setup_report(dirty, RegenOutcome::Failed, Some(failure), started)
                }
            }
        };

        let live = self.source.live_clones();
        if live == 0 {
            tracing::debug!("all working copies released");
        } else {
            tracing::warn!(live, "working copies outlived the run");
        }
        tracing::info!(
            outcome = ?report.outcome,
            completed = report.stats.frames_completed,
            failed = report.stats.frames_failed,
            total = report.stats.frames_total,
            elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
            "regeneration finished"
        );
        ctx.reporter.on_finished(&report);
        report
    }

    /// Worker count from the memory budget, then one working copy and one renderer per worker.
    fn prepare_workers(&self, dirty: &DirtyFrameSet) -> Result<Vec<SlotWorker<D>>, RunFailure> {
        let footprint = self
            .source
            .memory_footprint()
            .map_err(|e| RunFailure::Internal {
                reason: e.to_string(),
            })?;
        let requested = self.opts.resolved_max_workers().min(dirty.total()).max(1);
        let affordable = self.estimator.estimate_worker_count(footprint, requested);
        tracing::info!(
            frames = dirty.total(),
            requested,
            affordable,
            footprint,
            "starting regeneration"
        );

        let copies = self
            .cloner
            .clone_for_workers(&self.source, affordable)
            .map_err(|e| match e {
                RegenError::CloneFailed(reason) => RunFailure::CloneFailed { reason },
                other => RunFailure::Internal {
                    reason: other.to_string(),
                },
            })?;

        let mut workers = Vec::with_capacity(copies.len());
        let mut last_err = None;
        for doc in copies {
            match self.factory.create_renderer(&doc) {
                Ok(renderer) => workers.push(SlotWorker::new(workers.len(), doc, renderer)),
                Err(e) => {
                    tracing::warn!(error = %e, "renderer creation failed, dropping working copy");
                    last_err = Some(e.to_string());
                }
            }
        }
        if workers.is_empty() {
            return Err(RunFailure::RendererUnavailable {
                reason: last_err.unwrap_or_else(|| "no renderer created".to_string()),
            });
        }
        Ok(workers)
    }

    fn run_workers(
        &self,
        workers: Vec<SlotWorker<D>>,
        dirty: DirtyFrameSet,
        ctx: &ExecutionContext,
        mut phase: PhaseTracker,
        started: Instant,
    ) -> RegenReport {
        let pool = match build_worker_pool(workers.len()) {
            Ok(pool) => pool,
            Err(e) => {
                phase.enter(SchedulerPhase::Terminal(RegenOutcome::Failed));
                drop(workers);
                let failure = RunFailure::Internal {
                    reason: e.to_string(),
                };
                return setup_report(dirty, RegenOutcome::Failed, Some(failure), started);
            }
        };

        let abort = CancellationToken::new();
        let region = &self.opts.region_of_interest;
        let factory: &dyn RendererFactory<D> = self.factory.as_ref();
        let (ev_tx, ev_rx) = mpsc::channel::<SlotEvent>();

        pool.in_place_scope(|scope| {
            let mut slots = Vec::with_capacity(workers.len());
            for worker in workers {
                let (cmd_tx, cmd_rx) = mpsc::channel::<FrameIndex>();
                tracing::debug!(
                    slot = worker.id,
                    abortable = worker.abortable(),
                    "binding worker"
                );
                slots.push(WorkerSlot::new(worker.id, cmd_tx));
                let events = ev_tx.clone();
                let abort = &abort;
                scope.spawn(move |_| worker.run(factory, cmd_rx, events, region, abort));
            }
            drop(ev_tx);

            let mut feed = FeedLoop {
                slots,
                dirty,
                events: ev_rx,
                opts: &self.opts,
                ctx,
                abort: &abort,
                started,
                eta: EtaEstimator::new(started, self.opts.eta_smoothing),
                phase,
                cancel_reason: None,
                first_failure: None,
                failures: Vec::new(),
                completed_frames: Vec::new(),
                frames_cancelled: 0,
                indicator_shown: false,
            };
            feed.run();
            // Dropping the slots closes every command channel so the workers wind down before
            // the scope joins them.
            feed.finish()
        })
    }
}

/// Report for runs that never reached the feed loop: every dirty frame is skipped.
fn setup_report(
    mut dirty: DirtyFrameSet,
    outcome: RegenOutcome,
    failure: Option<RunFailure>,
    started: Instant,
) -> RegenReport {
    let skipped = dirty.drain_remaining();
    let mut report = RegenReport::empty(outcome);
    report.stats.frames_total = dirty.total() as u64;
    report.stats.frames_skipped = skipped.len() as u64;
    report.skipped_frames = skipped;
    report.failure = failure;
    report.elapsed = started.elapsed();
    report
}

fn build_worker_pool(workers: usize) -> RegenResult<rayon::ThreadPool> {
    if workers == 0 {
        return Err(RegenError::validation(
            "worker pool needs at least one thread",
        ));
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("regen-worker-{i}"))
        .build()
        .map_err(|e| RegenError::Other(anyhow::anyhow!("failed to build worker pool: {e}")))
}

/// Orchestrator state of a running regeneration. Lives on one thread only.
struct FeedLoop<'a> {
    slots: Vec<WorkerSlot>,
    dirty: DirtyFrameSet,
    events: mpsc::Receiver<SlotEvent>,
    opts: &'a RegenOpts,
    ctx: &'a ExecutionContext,
    abort: &'a CancellationToken,
    started: Instant,
    eta: EtaEstimator,
    phase: PhaseTracker,
    cancel_reason: Option<CancelReason>,
    first_failure: Option<RunFailure>,
    failures: Vec<FrameFailure>,
    completed_frames: Vec<FrameIndex>,
    frames_cancelled: u64,
    indicator_shown: bool,
}

impl FeedLoop<'_> {
    fn run(&mut self) {
        self.phase.enter(SchedulerPhase::Running);
        self.ctx
            .reporter
            .on_started(self.dirty.total() as u64, self.slots.len());
        for id in 0..self.slots.len() {
            self.dispatch(id);
        }

        loop {
            self.poll_cancellation();
            if self.busy_slots() == 0 {
                break;
            }
            match self.events.recv_timeout(self.opts.poll_interval()) {
                Ok(ev) => self.handle(ev),
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    self.fail_orphaned_frames();
                    break;
                }
            }
            self.maybe_show_indicator();
        }
    }

    /// No new frames go out once the run is cancelling or already terminal.
    fn stopping(&self) -> bool {
        self.cancel_reason.is_some() || self.phase.terminal().is_some()
    }

    fn busy_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.is_rendering()).count()
    }

    fn poll_cancellation(&mut self) {
        if !self.stopping() && self.ctx.cancel.is_cancelled() {
            self.begin_cancel(CancelReason::User);
        }
    }

    fn begin_cancel(&mut self, reason: CancelReason) {
        if self.stopping() {
            return;
        }
        tracing::info!(
            ?reason,
            phase = ?self.phase.phase(),
            in_flight = self.dirty.in_flight_count(),
            remaining = self.dirty.remaining_count(),
            "cancelling regeneration"
        );
        self.cancel_reason = Some(reason);
        self.phase.enter(SchedulerPhase::Cancelling);
        self.abort.cancel();
    }

    /// Hand the next frame to slot `id` if it is idle and dispatch is allowed.
    fn dispatch(&mut self, id: usize) {
        if self.stopping() || !self.slots[id].is_idle() {
            return;
        }
        let Some(frame) = self.dirty.take_next() else {
            return;
        };
        tracing::debug!(slot = id, frame = frame.0, "dispatch");
        if !self.slots[id].assign(frame) {
            self.dirty.settle(frame);
            self.record_failure(id, frame, "worker exited before accepting the frame".to_string());
        }
    }

    fn handle(&mut self, ev: SlotEvent) {
        let SlotEvent {
            slot,
            frame,
            result,
            elapsed,
        } = ev;
        self.slots[slot].finish(&result);
        self.dirty.settle(frame);

        match result {
            SlotResult::Completed => {
                tracing::debug!(
                    slot,
                    frame = frame.0,
                    elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                    "frame completed"
                );
                self.completed_frames.push(frame);
                self.eta.record(Instant::now());
                self.push_progress();
            }
            SlotResult::Cancelled => {
                tracing::debug!(slot, frame = frame.0, "frame cancelled by renderer");
                self.frames_cancelled += 1;
                self.begin_cancel(CancelReason::Renderer);
            }
            SlotResult::Failed(reason) => self.record_failure(slot, frame, reason),
        }

        self.poll_cancellation();
        self.dispatch(slot);
    }

    fn record_failure(&mut self, slot: usize, frame: FrameIndex, reason: String) {
        tracing::warn!(slot, frame = frame.0, %reason, "frame failed");
        let failure = FrameFailure {
            frame,
            slot,
            reason,
        };
        if self.first_failure.is_none() {
            self.first_failure = Some(RunFailure::RenderFailed {
                frame,
                reason: failure.reason.clone(),
            });
        }
        self.failures.push(failure.clone());
        self.push_progress();

        if self.opts.batch_mode {
            // Unattended: the whole run fails now; in-flight frames are only drained.
            if self.phase.enter(SchedulerPhase::Terminal(RegenOutcome::Failed)) {
                self.abort.cancel();
            }
        } else if !self.stopping()
            && self.ctx.reporter.on_frame_failed(&failure) == FailureDecision::Cancel
        {
            self.begin_cancel(CancelReason::AfterFailure);
        }
    }

    /// Every worker hung up while frames were still marked in flight.
    fn fail_orphaned_frames(&mut self) {
        let orphaned = self
            .slots
            .iter()
            .filter_map(|s| match s.state() {
                SlotState::Rendering(f) => Some((s.id(), f)),
                _ => None,
            })
            .collect::<Vec<_>>();
        for (slot, frame) in orphaned {
            self.slots[slot].finish(&SlotResult::Failed(String::new()));
            self.dirty.settle(frame);
            self.record_failure(slot, frame, "worker exited without reporting".to_string());
        }
    }

    fn progress_update(&self) -> ProgressUpdate {
        let completed = self.completed_frames.len() as u64;
        let failed = self.failures.len() as u64;
        let total = self.dirty.total() as u64;
        let remaining = total.saturating_sub(completed + failed + self.frames_cancelled);
        ProgressUpdate {
            action_title: self.opts.action_title.clone(),
            completed,
            failed,
            total,
            estimated_remaining: self.eta.estimate(remaining),
            elapsed: self.started.elapsed(),
        }
    }

    fn push_progress(&self) {
        self.ctx.reporter.on_progress(&self.progress_update());
    }

    fn maybe_show_indicator(&mut self) {
        if self.opts.batch_mode || self.indicator_shown || self.busy_slots() == 0 {
            return;
        }
        if self.started.elapsed() >= self.opts.busy_wait() {
            self.indicator_shown = true;
            self.ctx.reporter.on_show_indicator(&self.progress_update());
        }
    }

    fn finish(mut self) -> RegenReport {
        for slot in &mut self.slots {
            slot.tear_down();
        }
        let skipped = self.dirty.drain_remaining();

        let outcome = match self.phase.terminal() {
            Some(outcome) => outcome,
            None if self.cancel_reason.is_some() => RegenOutcome::Cancelled,
            None if !self.failures.is_empty() || !skipped.is_empty() => RegenOutcome::Failed,
            None => {
                self.phase.enter(SchedulerPhase::Completing);
                RegenOutcome::Complete
            }
        };
        if self.phase.terminal().is_none() {
            self.phase.enter(SchedulerPhase::Terminal(outcome));
        }

        let failure = match outcome {
            RegenOutcome::Failed => self.first_failure.take().or_else(|| {
                Some(RunFailure::Internal {
                    reason: format!("{} frames could not be dispatched", skipped.len()),
                })
            }),
            _ => None,
        };
        let stats = RegenStats {
            frames_total: self.dirty.total() as u64,
            frames_completed: self.completed_frames.len() as u64,
            frames_failed: self.failures.len() as u64,
            frames_cancelled: self.frames_cancelled,
            frames_skipped: skipped.len() as u64,
            workers: self.slots.len(),
        };
        for slot in &self.slots {
            tracing::debug!(
                slot = slot.id(),
                frames = slot.frames_rendered(),
                state = ?slot.state(),
                "slot summary"
            );
        }

        RegenReport {
            outcome,
            cancel_reason: self.cancel_reason,
            failure,
            failures: self.failures,
            completed_frames: self.completed_frames,
            skipped_frames: skipped,
            stats,
            elapsed: self.started.elapsed(),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/regen/scheduler.rs"]
mod tests;
