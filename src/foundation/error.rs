/// Convenience result type used across animregen.
pub type RegenResult<T> = Result<T, RegenError>;

/// Top-level error taxonomy used by regeneration APIs.
#[derive(thiserror::Error, Debug)]
pub enum RegenError {
    /// Invalid caller-provided configuration or arguments.
    #[error("validation error: {0}")]
    Validation(String),

    /// A working copy of the source document could not be created.
    #[error("clone failed: {0}")]
    CloneFailed(String),

    /// A renderer strategy reported an error for a frame.
    #[error("render failed: {0}")]
    RenderFailed(String),

    /// The source document cannot be locked because working copies are still alive.
    #[error("document busy: {0}")]
    DocumentBusy(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RegenError {
    /// Build a [`RegenError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`RegenError::CloneFailed`] value.
    pub fn clone_failed(msg: impl Into<String>) -> Self {
        Self::CloneFailed(msg.into())
    }

    /// Build a [`RegenError::RenderFailed`] value.
    pub fn render_failed(msg: impl Into<String>) -> Self {
        Self::RenderFailed(msg.into())
    }

    /// Build a [`RegenError::DocumentBusy`] value.
    pub fn document_busy(msg: impl Into<String>) -> Self {
        Self::DocumentBusy(msg.into())
    }

    pub(crate) fn poisoned(what: &str) -> Self {
        Self::Other(anyhow::anyhow!("{what} lock poisoned"))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
