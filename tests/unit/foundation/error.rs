use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        RegenError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        RegenError::clone_failed("x")
            .to_string()
            .contains("clone failed:")
    );
    assert!(
        RegenError::render_failed("x")
            .to_string()
            .contains("render failed:")
    );
    assert!(
        RegenError::document_busy("x")
            .to_string()
            .contains("document busy:")
    );
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = RegenError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}

#[test]
fn poisoned_names_the_lock() {
    let err = RegenError::poisoned("source document");
    assert!(err.to_string().contains("source document lock poisoned"));
}
