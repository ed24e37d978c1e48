use super::*;

#[test]
fn clones_share_cancellation_state() {
    let token = CancellationToken::new();
    let worker = token.clone();
    assert!(!worker.is_cancelled());

    token.cancel();
    assert!(worker.is_cancelled());

    token.cancel();
    assert!(token.is_cancelled());
}

#[test]
fn cancellation_is_visible_across_threads() {
    let token = CancellationToken::new();
    let remote = token.clone();
    std::thread::spawn(move || remote.cancel()).join().unwrap();
    assert!(token.is_cancelled());
}
