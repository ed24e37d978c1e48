//! animregen regenerates the dirty frames of an animated image document in parallel.
//!
//! A run goes through three steps:
//!
//! - A [`DirtyFramePolicy`] decides which frames are stale
//! - A [`MemoryBudgetEstimator`] decides how many working copies of the [`SourceDocument`] fit in
//!   memory, and one [`FrameRenderer`] is bound to each copy
//! - [`RegenerationScheduler::regenerate_range`] keeps every worker fed until the frames run out,
//!   the run is cancelled, or a frame fails, and returns a [`RegenReport`]
//!
//! The [`synthetic`] module provides a ready-made document and renderer.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod budget;
mod document;
mod foundation;
mod frames;
mod regen;
mod render;

/// In-memory layered document and checksum renderer.
pub mod synthetic;

pub use crate::foundation::core::{FrameIndex, FrameRange, IntRect, Region};
pub use crate::foundation::error::{RegenError, RegenResult};

pub use crate::budget::memory::{
    FixedMemoryProbe, MemoryBudgetEstimator, MemoryBudgetOpts, MemoryProbe, SystemMemoryProbe,
};
pub use crate::document::cloner::DocumentCloner;
pub use crate::document::source::{ClonedDocument, ImageDocument, SourceDocument};
pub use crate::frames::dirty::{DirtyFrameSet, FeedOrder};
pub use crate::frames::policy::{DirtyFramePolicy, FnPolicy, FrameList};
pub use crate::regen::cancel::CancellationToken;
pub use crate::regen::handle::RegenerationHandle;
pub use crate::regen::opts::RegenOpts;
pub use crate::regen::progress::{
    ChannelProgressReporter, FailureDecision, LogProgressReporter, NullProgressReporter,
    ProgressEvent, ProgressReporter, ProgressUpdate,
};
pub use crate::regen::report::{
    CancelReason, FrameFailure, RegenOutcome, RegenReport, RegenStats, RunFailure,
};
pub use crate::regen::scheduler::{ExecutionContext, RegenerationScheduler};
pub use crate::render::renderer::{FrameContext, FrameRenderer, FrameStatus, RendererFactory};
