use crate::document::source::{ClonedDocument, ImageDocument, SourceDocument};
use crate::foundation::error::{RegenError, RegenResult};

/// Creates working copies of a [`SourceDocument`] for worker slots.
#[derive(Clone, Copy, Debug, Default)]
pub struct DocumentCloner;

impl DocumentCloner {
    /// Create one deep copy. The source's read barrier is held only while copying.
    pub fn clone_document<D: ImageDocument>(
        &self,
        source: &SourceDocument<D>,
    ) -> RegenResult<ClonedDocument<D>> {
        source.duplicate_scoped()
    }

    /// Create up to `requested` copies, degrading on [`RegenError::CloneFailed`].
    ///
    /// While no copy exists yet, each failure lowers the target by one and retries; the call
    /// fails only once the target drops below one. After the first successful copy, a failure
    /// keeps the copies made so far and skips the rest. Any other error is returned as-is.
    #[tracing::instrument(skip(self, source))]
    pub fn clone_for_workers<D: ImageDocument>(
        &self,
        source: &SourceDocument<D>,
        requested: usize,
    ) -> RegenResult<Vec<ClonedDocument<D>>> {
        let mut target = requested.max(1);
        let mut out = Vec::with_capacity(target);
        while out.len() < target {
            match self.clone_document(source) {
                Ok(copy) => out.push(copy),
                Err(RegenError::CloneFailed(reason)) if out.is_empty() => {
                    target -= 1;
                    tracing::warn!(
                        %reason,
                        target,
                        "document copy failed, retrying with fewer workers"
                    );
                    if target == 0 {
                        return Err(RegenError::clone_failed(format!(
                            "could not create a single working copy: {reason}"
                        )));
                    }
                }
                Err(RegenError::CloneFailed(reason)) => {
                    tracing::warn!(
                        %reason,
                        created = out.len(),
                        skipped = target - out.len(),
                        "document copy failed, continuing with the copies already made"
                    );
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/document/cloner.rs"]
mod tests;
