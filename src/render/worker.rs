use crate::document::source::{ClonedDocument, ImageDocument};
use crate::foundation::core::{FrameIndex, Region};
use crate::foundation::error::RegenResult;
use crate::regen::cancel::CancellationToken;
use crate::render::renderer::{FrameContext, FrameRenderer, FrameStatus, RendererFactory};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc;
use std::time::{Duration, Instant};

/// Orchestrator-side state of a worker slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SlotState {
    Idle,
    Rendering(FrameIndex),
    /// Torn down after a renderer error; never reused in this run.
    Failed,
}

#[derive(Debug)]
pub(crate) enum SlotResult {
    Completed,
    Cancelled,
    Failed(String),
}

/// Notification sent from a worker thread to the orchestrator.
#[derive(Debug)]
pub(crate) struct SlotEvent {
    pub(crate) slot: usize,
    pub(crate) frame: FrameIndex,
    pub(crate) result: SlotResult,
    pub(crate) elapsed: Duration,
}

/// Orchestrator handle of one worker slot. Only touched on the orchestrating thread.
#[derive(Debug)]
pub(crate) struct WorkerSlot {
    id: usize,
    state: SlotState,
    commands: Option<mpsc::Sender<FrameIndex>>,
    frames_rendered: u64,
}

impl WorkerSlot {
    pub(crate) fn new(id: usize, commands: mpsc::Sender<FrameIndex>) -> Self {
        Self {
            id,
            state: SlotState::Idle,
            commands: Some(commands),
            frames_rendered: 0,
        }
    }

    pub(crate) fn id(&self) -> usize {
        self.id
    }

    pub(crate) fn state(&self) -> SlotState {
        self.state
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.state == SlotState::Idle
    }

    pub(crate) fn is_rendering(&self) -> bool {
        matches!(self.state, SlotState::Rendering(_))
    }

    pub(crate) fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Idle -> Rendering. Returns `false` when the worker thread is gone; the slot is then
    /// failed and the frame was not dispatched.
    pub(crate) fn assign(&mut self, frame: FrameIndex) -> bool {
        debug_assert!(self.is_idle(), "slot {} assigned while {:?}", self.id, self.state);
        let sent = self
            .commands
            .as_ref()
            .is_some_and(|tx| tx.send(frame).is_ok());
        if sent {
            self.state = SlotState::Rendering(frame);
        } else {
            self.tear_down();
            self.state = SlotState::Failed;
        }
        sent
    }

    /// Rendering -> Idle, or Rendering -> Failed on a renderer error.
    pub(crate) fn finish(&mut self, result: &SlotResult) {
        match result {
            SlotResult::Completed => {
                self.frames_rendered += 1;
                self.state = SlotState::Idle;
            }
            SlotResult::Cancelled => self.state = SlotState::Idle,
            SlotResult::Failed(_) => {
                self.tear_down();
                self.state = SlotState::Failed;
            }
        }
    }

    /// Close the command channel; the worker thread exits after its current frame.
    pub(crate) fn tear_down(&mut self) {
        self.commands = None;
    }
}

/// Worker-thread side of a slot: owns the working copy and the renderer bound to it.
pub(crate) struct SlotWorker<D> {
    pub(crate) id: usize,
    doc: ClonedDocument<D>,
    renderer: Box<dyn FrameRenderer<D>>,
    abortable: bool,
}

impl<D: ImageDocument> SlotWorker<D> {
    pub(crate) fn new(
        id: usize,
        doc: ClonedDocument<D>,
        renderer: Box<dyn FrameRenderer<D>>,
    ) -> Self {
        let abortable = renderer.supports_abort();
        Self {
            id,
            doc,
            renderer,
            abortable,
        }
    }

    pub(crate) fn abortable(&self) -> bool {
        self.abortable
    }

    /// Render frames until the command channel closes or a frame fails.
    ///
    /// The working copy and renderer are dropped when this returns.
    pub(crate) fn run(
        mut self,
        factory: &dyn RendererFactory<D>,
        commands: mpsc::Receiver<FrameIndex>,
        events: mpsc::Sender<SlotEvent>,
        region: &Region,
        abort: &CancellationToken,
    ) {
        tracing::debug!(slot = self.id, "worker started");
        while let Ok(frame) = commands.recv() {
            let started = Instant::now();
            let result = self.render_one(factory, frame, region, abort);
            let failed = matches!(result, SlotResult::Failed(_));
            let ev = SlotEvent {
                slot: self.id,
                frame,
                result,
                elapsed: started.elapsed(),
            };
            if events.send(ev).is_err() || failed {
                break;
            }
        }
        tracing::debug!(slot = self.id, "worker stopped");
    }

    fn render_one(
        &mut self,
        factory: &dyn RendererFactory<D>,
        frame: FrameIndex,
        region: &Region,
        abort: &CancellationToken,
    ) -> SlotResult {
        let ctx = FrameContext {
            frame,
            region,
            slot: self.id,
            abort: self.abortable.then_some(abort),
        };
        let doc: &mut D = &mut self.doc;
        let renderer = &mut self.renderer;
        let res = catch_unwind(AssertUnwindSafe(|| -> RegenResult<FrameStatus> {
            factory.initialize_renderer_for_frame(&mut **renderer, doc, frame)?;
            renderer.render_frame(doc, &ctx)
        }));
        match res {
            Ok(Ok(FrameStatus::Completed)) => SlotResult::Completed,
            Ok(Ok(FrameStatus::Cancelled)) => SlotResult::Cancelled,
            Ok(Err(e)) => SlotResult::Failed(e.to_string()),
            Err(payload) => SlotResult::Failed(format!(
                "renderer panicked: {}",
                panic_message(payload.as_ref())
            )),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/worker.rs"]
mod tests;
