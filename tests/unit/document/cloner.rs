use super::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Document whose copies succeed only `allowed` times in total.
struct Doc {
    allowed: Arc<AtomicUsize>,
    attempts: Arc<AtomicUsize>,
}

impl ImageDocument for Doc {
    fn memory_footprint(&self) -> u64 {
        1024
    }

    fn duplicate(&self) -> RegenResult<Self> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.allowed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .map_err(|_| RegenError::clone_failed("out of memory"))?;
        Ok(Doc {
            allowed: Arc::clone(&self.allowed),
            attempts: Arc::clone(&self.attempts),
        })
    }
}

fn source(allowed: usize) -> (SourceDocument<Doc>, Arc<AtomicUsize>) {
    let attempts = Arc::new(AtomicUsize::new(0));
    let doc = Doc {
        allowed: Arc::new(AtomicUsize::new(allowed)),
        attempts: Arc::clone(&attempts),
    };
    (SourceDocument::new(doc), attempts)
}

#[test]
fn creates_requested_copies_when_memory_allows() {
    let (src, _) = source(usize::MAX);
    let copies = DocumentCloner.clone_for_workers(&src, 4).unwrap();
    assert_eq!(copies.len(), 4);
    assert_eq!(src.live_clones(), 4);
    drop(copies);
    assert_eq!(src.live_clones(), 0);
}

#[test]
fn later_failure_keeps_existing_copies_and_skips_the_rest() {
    let (src, attempts) = source(1);
    let copies = DocumentCloner.clone_for_workers(&src, 4).unwrap();
    assert_eq!(copies.len(), 1);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn fails_only_after_every_retry_failed() {
    let (src, attempts) = source(0);
    let err = DocumentCloner.clone_for_workers(&src, 3).unwrap_err();
    assert!(matches!(err, RegenError::CloneFailed(_)));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(src.live_clones(), 0);
}

#[test]
fn zero_requested_still_tries_one_copy() {
    let (src, _) = source(usize::MAX);
    let copies = DocumentCloner.clone_for_workers(&src, 0).unwrap();
    assert_eq!(copies.len(), 1);
}
