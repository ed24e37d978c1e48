use crate::foundation::core::{FrameIndex, Region};
use crate::foundation::error::RegenResult;
use crate::regen::cancel::CancellationToken;

/// How a renderer finished one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FrameStatus {
    /// The frame was regenerated.
    Completed,
    /// The renderer gave up on the frame (abort requested or the document became unusable).
    ///
    /// A cancelled frame cancels the whole run.
    Cancelled,
}

/// Per-invocation context handed to [`FrameRenderer::render_frame`].
#[derive(Debug)]
pub struct FrameContext<'a> {
    /// Frame being regenerated.
    pub frame: FrameIndex,
    /// Region of interest; empty means the whole frame.
    pub region: &'a Region,
    /// Index of the worker slot running this frame.
    pub slot: usize,
    /// Set only for renderers that opted in through [`FrameRenderer::supports_abort`].
    pub(crate) abort: Option<&'a CancellationToken>,
}

impl FrameContext<'_> {
    /// Return `true` once the run wants in-flight frames to stop early.
    ///
    /// Always `false` for renderers that do not report [`FrameRenderer::supports_abort`]; their
    /// in-flight frames run to completion.
    pub fn abort_requested(&self) -> bool {
        self.abort.is_some_and(CancellationToken::is_cancelled)
    }
}

/// Renders single frames on one working copy of the document.
///
/// One renderer instance is bound to one worker slot for the whole run and is only ever called
/// from that slot's thread.
pub trait FrameRenderer<D>: Send {
    /// Regenerate `ctx.frame` into `doc`.
    ///
    /// Errors (and panics) are recorded as a failure of this frame and tear the slot down.
    fn render_frame(&mut self, doc: &mut D, ctx: &FrameContext<'_>) -> RegenResult<FrameStatus>;

    /// Whether the renderer polls [`FrameContext::abort_requested`].
    ///
    /// Read once when the renderer is bound to its worker slot.
    fn supports_abort(&self) -> bool {
        false
    }
}

/// Caller-supplied factory creating renderers for worker slots.
pub trait RendererFactory<D>: Send + Sync {
    /// Create a renderer bound to the working copy `doc`.
    fn create_renderer(&self, doc: &D) -> RegenResult<Box<dyn FrameRenderer<D>>>;

    /// Prepare `renderer` and `doc` before `frame` is rendered.
    ///
    /// Called on the worker thread, right before [`FrameRenderer::render_frame`].
    fn initialize_renderer_for_frame(
        &self,
        _renderer: &mut dyn FrameRenderer<D>,
        _doc: &mut D,
        _frame: FrameIndex,
    ) -> RegenResult<()> {
        Ok(())
    }
}
