use crate::foundation::error::{RegenError, RegenResult};
use std::ops::{Deref, DerefMut};
use std::sync::{
    Arc, RwLock,
    atomic::{AtomicUsize, Ordering},
};

/// The mutable, opaque resource frames are rendered from.
///
/// The scheduler never renders on the authoritative instance; it renders on deep copies obtained
/// through [`ImageDocument::duplicate`].
pub trait ImageDocument: Send + Sync + 'static {
    /// Current memory footprint in bytes. Used to estimate the cost of one working copy.
    fn memory_footprint(&self) -> u64;

    /// Produce a deep, structurally independent copy.
    ///
    /// Implementations should allocate fallibly (e.g. `Vec::try_reserve_exact`) and report an
    /// incomplete copy as [`RegenError::CloneFailed`].
    fn duplicate(&self) -> RegenResult<Self>
    where
        Self: Sized;
}

struct SourceInner<D> {
    doc: RwLock<D>,
    live_clones: Arc<AtomicUsize>,
}

/// The single authoritative document instance.
///
/// Cheap to clone (shared handle). Reads take a shared lock; edits take the exclusive lock and
/// are refused while any [`ClonedDocument`] created from this source is alive, so that working
/// copies always observe one consistent snapshot.
pub struct SourceDocument<D> {
    inner: Arc<SourceInner<D>>,
}

impl<D> Clone for SourceDocument<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: ImageDocument> SourceDocument<D> {
    /// Wrap `doc` as the authoritative instance.
    pub fn new(doc: D) -> Self {
        Self {
            inner: Arc::new(SourceInner {
                doc: RwLock::new(doc),
                live_clones: Arc::new(AtomicUsize::new(0)),
            }),
        }
    }

    /// Run `f` with shared access to the document.
    pub fn read<R>(&self, f: impl FnOnce(&D) -> R) -> RegenResult<R> {
        let guard = self
            .inner
            .doc
            .read()
            .map_err(|_| RegenError::poisoned("source document"))?;
        Ok(f(&guard))
    }

    /// Memory footprint of the authoritative instance.
    pub fn memory_footprint(&self) -> RegenResult<u64> {
        self.read(|d| d.memory_footprint())
    }

    /// Run `f` with exclusive access to the document.
    ///
    /// Fails with [`RegenError::DocumentBusy`] while working copies exist.
    pub fn try_edit<R>(&self, f: impl FnOnce(&mut D) -> R) -> RegenResult<R> {
        let mut guard = self
            .inner
            .doc
            .write()
            .map_err(|_| RegenError::poisoned("source document"))?;
        // Copies are only created under the read lock, so the count cannot grow while we hold
        // the write lock.
        let live = self.live_clones();
        if live > 0 {
            return Err(RegenError::document_busy(format!(
                "{live} working cop{} still alive",
                if live == 1 { "y is" } else { "ies are" }
            )));
        }
        Ok(f(&mut guard))
    }

    /// Number of working copies currently alive.
    pub fn live_clones(&self) -> usize {
        self.inner.live_clones.load(Ordering::Acquire)
    }

    /// Copy the document while holding the read barrier for the duration of the copy only.
    pub(crate) fn duplicate_scoped(&self) -> RegenResult<ClonedDocument<D>> {
        let guard = self
            .inner
            .doc
            .read()
            .map_err(|_| RegenError::poisoned("source document"))?;
        let doc = guard.duplicate()?;
        self.inner.live_clones.fetch_add(1, Ordering::AcqRel);
        drop(guard);
        Ok(ClonedDocument {
            doc,
            _lease: CloneLease {
                live_clones: Arc::clone(&self.inner.live_clones),
            },
        })
    }
}

struct CloneLease {
    live_clones: Arc<AtomicUsize>,
}

impl Drop for CloneLease {
    fn drop(&mut self) {
        self.live_clones.fetch_sub(1, Ordering::AcqRel);
    }
}

/// An exclusively owned working copy of a [`SourceDocument`].
///
/// Dropping it releases the copy and lets the source be edited again once every copy is gone.
pub struct ClonedDocument<D> {
    doc: D,
    _lease: CloneLease,
}

impl<D> Deref for ClonedDocument<D> {
    type Target = D;

    fn deref(&self) -> &D {
        &self.doc
    }
}

impl<D> DerefMut for ClonedDocument<D> {
    fn deref_mut(&mut self) -> &mut D {
        &mut self.doc
    }
}

impl<D> std::fmt::Debug for ClonedDocument<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClonedDocument").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/document/source.rs"]
mod tests;
