use super::*;
use crate::budget::memory::FixedMemoryProbe;
use crate::foundation::core::FrameIndex;
use crate::frames::policy::FrameList;
use crate::render::renderer::{FrameContext, FrameRenderer, FrameStatus};
use std::sync::Mutex;

struct Doc;

impl ImageDocument for Doc {
    fn memory_footprint(&self) -> u64 {
        1024
    }

    fn duplicate(&self) -> RegenResult<Self> {
        Ok(Doc)
    }
}

struct Recorder {
    seen: Arc<Mutex<Vec<u64>>>,
}

impl FrameRenderer<Doc> for Recorder {
    fn render_frame(
        &mut self,
        _doc: &mut Doc,
        ctx: &FrameContext<'_>,
    ) -> RegenResult<FrameStatus> {
        self.seen.lock().unwrap().push(ctx.frame.0);
        Ok(FrameStatus::Completed)
    }
}

struct RecorderFactory {
    seen: Arc<Mutex<Vec<u64>>>,
    refuse: bool,
}

impl RendererFactory<Doc> for RecorderFactory {
    fn create_renderer(&self, _doc: &Doc) -> RegenResult<Box<dyn FrameRenderer<Doc>>> {
        if self.refuse {
            return Err(RegenError::validation("no renderer today"));
        }
        Ok(Box::new(Recorder {
            seen: Arc::clone(&self.seen),
        }))
    }
}

fn scheduler(frames: &[u64], refuse: bool) -> (RegenerationScheduler<Doc>, Arc<Mutex<Vec<u64>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let opts = RegenOpts {
        max_workers: Some(3),
        ..RegenOpts::default()
    };
    let s = RegenerationScheduler::new(
        SourceDocument::new(Doc),
        Arc::new(FrameList::ascending(frames.iter().copied().map(FrameIndex))),
        Arc::new(RecorderFactory {
            seen: Arc::clone(&seen),
            refuse,
        }),
        opts,
    )
    .unwrap()
    .with_memory_probe(Arc::new(FixedMemoryProbe(1 << 30)));
    (s, seen)
}

#[test]
fn phase_tracker_refuses_to_leave_terminal() {
    let mut p = PhaseTracker::new();
    assert_eq!(p.phase(), SchedulerPhase::Idle);
    assert!(p.enter(SchedulerPhase::Initializing));
    assert!(p.enter(SchedulerPhase::Running));
    assert!(p.enter(SchedulerPhase::Terminal(RegenOutcome::Failed)));
    assert!(!p.enter(SchedulerPhase::Terminal(RegenOutcome::Complete)));
    assert!(!p.enter(SchedulerPhase::Running));
    assert_eq!(p.terminal(), Some(RegenOutcome::Failed));
}

#[test]
fn renders_each_dirty_frame_once() {
    let (s, seen) = scheduler(&[4, 2, 2, 9, 4, 7], false);
    let report = s.regenerate_range(&ExecutionContext::new());

    assert!(report.is_complete());
    assert_eq!(report.stats.frames_total, 4);
    assert_eq!(report.stats.frames_completed, 4);
    assert_eq!(report.stats.workers, 3);
    let mut got = seen.lock().unwrap().clone();
    got.sort_unstable();
    assert_eq!(got, vec![2, 4, 7, 9]);
    assert_eq!(s.source().live_clones(), 0);
}

#[test]
fn worker_count_never_exceeds_frame_count() {
    let (s, _) = scheduler(&[1], false);
    let report = s.regenerate_range(&ExecutionContext::new());
    assert!(report.is_complete());
    assert_eq!(report.stats.workers, 1);
}

#[test]
fn renderer_factory_failure_fails_the_run() {
    let (s, seen) = scheduler(&[1, 2], true);
    let report = s.regenerate_range(&ExecutionContext::new());

    assert_eq!(report.outcome, RegenOutcome::Failed);
    assert!(matches!(
        report.failure,
        Some(RunFailure::RendererUnavailable { ref reason }) if reason.contains("no renderer today")
    ));
    assert_eq!(report.stats.frames_skipped, 2);
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(s.source().live_clones(), 0);
}

#[test]
fn cancelled_before_start_dispatches_nothing() {
    let (s, seen) = scheduler(&[1, 2, 3], false);
    let ctx = ExecutionContext::new();
    ctx.cancellation().cancel();
    let report = s.regenerate_range(&ctx);

    assert_eq!(report.outcome, RegenOutcome::Cancelled);
    assert_eq!(report.cancel_reason, Some(CancelReason::User));
    assert_eq!(report.skipped_frames.len(), 3);
    assert!(seen.lock().unwrap().is_empty());
}

#[test]
fn setters_update_options() {
    let (mut s, _) = scheduler(&[], false);
    assert!(!s.batch_mode());
    s.set_batch_mode(true);
    assert!(s.batch_mode());

    let roi = Region::from_rect(crate::foundation::core::IntRect::new(0, 0, 8, 8));
    s.set_region_of_interest(roi.clone());
    assert_eq!(s.region_of_interest(), &roi);
    assert_eq!(s.opts().region_of_interest, roi);
}

#[test]
fn zero_workers_is_not_a_pool() {
    assert!(build_worker_pool(0).is_err());
    assert_eq!(build_worker_pool(2).unwrap().current_num_threads(), 2);
}
