use super::*;

struct Doc {
    bytes: Vec<u8>,
}

impl ImageDocument for Doc {
    fn memory_footprint(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn duplicate(&self) -> RegenResult<Self> {
        Ok(Doc {
            bytes: self.bytes.clone(),
        })
    }
}

#[test]
fn copies_are_independent_of_the_source() {
    let source = SourceDocument::new(Doc {
        bytes: vec![1, 2, 3],
    });
    let mut copy = source.duplicate_scoped().unwrap();
    copy.bytes[0] = 42;

    assert_eq!(source.read(|d| d.bytes.clone()).unwrap(), vec![1, 2, 3]);
    assert_eq!(copy.bytes, vec![42, 2, 3]);
    assert_eq!(source.memory_footprint().unwrap(), 3);
}

#[test]
fn edits_are_refused_while_copies_are_alive() {
    let source = SourceDocument::new(Doc { bytes: vec![0; 4] });
    let a = source.duplicate_scoped().unwrap();
    let b = source.duplicate_scoped().unwrap();
    assert_eq!(source.live_clones(), 2);

    let err = source.try_edit(|d| d.bytes.push(1)).unwrap_err();
    assert!(matches!(err, RegenError::DocumentBusy(_)));

    drop(a);
    assert!(source.try_edit(|d| d.bytes.push(1)).is_err());
    drop(b);
    assert_eq!(source.live_clones(), 0);

    source.try_edit(|d| d.bytes.push(1)).unwrap();
    assert_eq!(source.memory_footprint().unwrap(), 5);
}

#[test]
fn copies_can_move_to_other_threads() {
    let source = SourceDocument::new(Doc { bytes: vec![7; 8] });
    let copy = source.duplicate_scoped().unwrap();
    let len = std::thread::spawn(move || copy.bytes.len()).join().unwrap();
    assert_eq!(len, 8);
    assert_eq!(source.live_clones(), 0);
}
