use super::*;
use crate::foundation::core::FrameIndex;

fn update(completed: u64, failed: u64, eta: Option<Duration>) -> ProgressUpdate {
    ProgressUpdate {
        action_title: "Regenerating frames".to_string(),
        completed,
        failed,
        total: 10,
        estimated_remaining: eta,
        elapsed: Duration::from_secs(1),
    }
}

#[test]
fn status_text_has_title_counts_and_eta() {
    let text = update(3, 1, Some(Duration::from_secs(3725))).status_text();
    assert_eq!(
        text,
        "Regenerating frames\nFrame 4 of 10\nEstimated time remaining: 1:02:05"
    );
}

#[test]
fn status_text_without_estimate() {
    let text = update(0, 0, None).status_text();
    assert!(text.ends_with("Estimated time remaining: calculating..."));
}

#[test]
fn eta_is_unknown_until_first_completion() {
    let start = Instant::now();
    let mut eta = EtaEstimator::new(start, 0.5);
    assert_eq!(eta.estimate(5), None);

    eta.record(start + Duration::from_secs(2));
    assert_eq!(eta.estimate(5), Some(Duration::from_secs(10)));
}

#[test]
fn eta_smooths_intervals() {
    let start = Instant::now();
    let mut eta = EtaEstimator::new(start, 0.5);
    eta.record(start + Duration::from_secs(2));
    eta.record(start + Duration::from_secs(6));
    // 0.5 * 4 + 0.5 * 2 = 3 seconds per frame
    assert_eq!(eta.estimate(2), Some(Duration::from_secs(6)));
    assert_eq!(eta.estimate(0), Some(Duration::ZERO));
}

#[test]
fn channel_reporter_forwards_events_and_decision() {
    let (reporter, rx) = ChannelProgressReporter::channel();
    let reporter = reporter.with_failure_decision(FailureDecision::Cancel);

    reporter.on_started(10, 2);
    reporter.on_progress(&update(1, 0, None));
    let decision = reporter.on_frame_failed(&FrameFailure {
        frame: FrameIndex(4),
        slot: 1,
        reason: "boom".to_string(),
    });
    assert_eq!(decision, FailureDecision::Cancel);

    let events = rx.try_iter().collect::<Vec<_>>();
    assert_eq!(events.len(), 3);
    assert!(matches!(
        events[0],
        ProgressEvent::Started {
            total: 10,
            workers: 2
        }
    ));
    assert!(matches!(&events[1], ProgressEvent::Progress(u) if u.completed == 1));
    assert!(matches!(&events[2], ProgressEvent::FrameFailed(f) if f.frame == FrameIndex(4)));
}

#[test]
fn channel_reporter_survives_dropped_receiver() {
    let (reporter, rx) = ChannelProgressReporter::channel();
    drop(rx);
    reporter.on_started(1, 1);
    assert_eq!(
        reporter.on_frame_failed(&FrameFailure {
            frame: FrameIndex(0),
            slot: 0,
            reason: String::new(),
        }),
        FailureDecision::Continue
    );
}
