//! A self-contained document and renderer for demos, tests and benchmarking the scheduler.
//!
//! [`LayeredDocument`] is a stack of 8-bit grayscale layers over a fixed canvas plus one
//! projection buffer that renderers write into. [`ChecksumRenderer`] composites the layers for a
//! frame and records a SHA-256 checksum of the result, so runs can be compared frame by frame.

use crate::document::source::ImageDocument;
use crate::foundation::core::{FrameIndex, IntRect};
use crate::foundation::error::{RegenError, RegenResult};
use crate::render::renderer::{FrameContext, FrameRenderer, FrameStatus, RendererFactory};
use sha2::Digest as _;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Layered grayscale image document.
#[derive(Debug)]
pub struct LayeredDocument {
    width: u32,
    height: u32,
    layers: Vec<Vec<u8>>,
    projection: Vec<u8>,
    last_rendered: Option<FrameIndex>,
}

impl LayeredDocument {
    /// Create a `width` x `height` document with `layers` patterned layers.
    pub fn new(width: u32, height: u32, layers: usize) -> RegenResult<Self> {
        if width == 0 || height == 0 {
            return Err(RegenError::validation("document size must be non-zero"));
        }
        if layers == 0 {
            return Err(RegenError::validation("document needs at least one layer"));
        }
        let len = pixel_count(width, height)?;
        let layers = (0..layers)
            .map(|l| {
                (0..len)
                    .map(|i| ((i % width as usize) * (l + 1) + l * 31) as u8)
                    .collect()
            })
            .collect();
        Ok(Self {
            width,
            height,
            layers,
            projection: vec![0; len],
            last_rendered: None,
        })
    }

    /// Single-layer document whose footprint is `mib` MiB.
    pub fn with_footprint_mib(mib: u32) -> RegenResult<Self> {
        // one layer plus the projection, 1 KiB per row each
        let height = 512u32
            .checked_mul(mib.max(1))
            .ok_or_else(|| RegenError::validation(format!("{mib} MiB document is too large")))?;
        Self::new(1024, height, 1)
    }

    /// Canvas width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Canvas height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Canvas rectangle.
    pub fn bounds(&self) -> IntRect {
        IntRect::new(0, 0, self.width, self.height)
    }

    /// Number of layers.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Composited pixels of the last rendered frame.
    pub fn projection(&self) -> &[u8] {
        &self.projection
    }

    /// Frame most recently rendered into this instance.
    pub fn last_rendered(&self) -> Option<FrameIndex> {
        self.last_rendered
    }

    /// Fill layer `layer` with `value`.
    pub fn paint_layer(&mut self, layer: usize, value: u8) -> RegenResult<()> {
        let count = self.layers.len();
        let l = self.layers.get_mut(layer).ok_or_else(|| {
            RegenError::validation(format!("layer {layer} out of range (have {count})"))
        })?;
        l.fill(value);
        Ok(())
    }

    /// Composite `rect` of `frame` into the projection.
    fn composite(&mut self, frame: FrameIndex, rect: IntRect, ctx: &FrameContext<'_>) -> bool {
        let w = self.width as usize;
        let shift = (frame.0 % 256) as u8;
        for y in rect.y as usize..rect.y as usize + rect.height as usize {
            if ctx.abort_requested() {
                return false;
            }
            for x in rect.x as usize..rect.x as usize + rect.width as usize {
                let i = y * w + x;
                let v = self
                    .layers
                    .iter()
                    .fold(shift, |acc, l| acc.wrapping_add(l[i]));
                self.projection[i] = v;
            }
        }
        self.last_rendered = Some(frame);
        true
    }
}

fn pixel_count(width: u32, height: u32) -> RegenResult<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| RegenError::validation("document size overflows"))
}

fn try_copy(src: &[u8], what: &str) -> RegenResult<Vec<u8>> {
    let mut out = Vec::new();
    out.try_reserve_exact(src.len())
        .map_err(|e| RegenError::clone_failed(format!("{what}: {e}")))?;
    out.extend_from_slice(src);
    Ok(out)
}

impl ImageDocument for LayeredDocument {
    fn memory_footprint(&self) -> u64 {
        let layers: usize = self.layers.iter().map(Vec::len).sum();
        (layers + self.projection.len()) as u64
    }

    fn duplicate(&self) -> RegenResult<Self> {
        let mut layers = Vec::new();
        layers
            .try_reserve_exact(self.layers.len())
            .map_err(|e| RegenError::clone_failed(format!("layer table: {e}")))?;
        for (i, l) in self.layers.iter().enumerate() {
            layers.push(try_copy(l, &format!("layer {i}"))?);
        }
        Ok(Self {
            width: self.width,
            height: self.height,
            layers,
            projection: try_copy(&self.projection, "projection")?,
            last_rendered: self.last_rendered,
        })
    }
}

/// Per-frame checksums collected by [`ChecksumRenderer`]s. Shared between all slots.
#[derive(Clone, Debug, Default)]
pub struct FrameChecksums {
    inner: Arc<Mutex<BTreeMap<FrameIndex, String>>>,
}

impl FrameChecksums {
    /// Hex SHA-256 of the projection region rendered for `frame`.
    pub fn get(&self, frame: FrameIndex) -> Option<String> {
        self.lock().get(&frame).cloned()
    }

    /// Number of frames recorded.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Return `true` when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of all recorded checksums.
    pub fn snapshot(&self) -> BTreeMap<FrameIndex, String> {
        self.lock().clone()
    }

    fn insert(&self, frame: FrameIndex, sum: String) {
        self.lock().insert(frame, sum);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<FrameIndex, String>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Renderer compositing [`LayeredDocument`] frames and recording their checksums.
#[derive(Debug)]
pub struct ChecksumRenderer {
    sums: FrameChecksums,
    failing: Arc<BTreeSet<FrameIndex>>,
    frame_delay: Duration,
}

impl FrameRenderer<LayeredDocument> for ChecksumRenderer {
    fn render_frame(
        &mut self,
        doc: &mut LayeredDocument,
        ctx: &FrameContext<'_>,
    ) -> RegenResult<FrameStatus> {
        if self.failing.contains(&ctx.frame) {
            return Err(RegenError::render_failed(format!(
                "frame {} is marked as failing",
                ctx.frame
            )));
        }
        if !self.frame_delay.is_zero() {
            std::thread::sleep(self.frame_delay);
        }

        let rect = ctx.region.resolve(doc.bounds());
        if !doc.composite(ctx.frame, rect, ctx) {
            return Ok(FrameStatus::Cancelled);
        }

        let mut hasher = sha2::Sha256::new();
        let w = doc.width() as usize;
        for y in rect.y as usize..rect.y as usize + rect.height as usize {
            let row = y * w + rect.x as usize;
            hasher.update(&doc.projection()[row..row + rect.width as usize]);
        }
        self.sums.insert(ctx.frame, hex(&hasher.finalize()));
        Ok(FrameStatus::Completed)
    }

    fn supports_abort(&self) -> bool {
        true
    }
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

/// Factory handing out [`ChecksumRenderer`]s that share one [`FrameChecksums`] store.
#[derive(Clone, Debug, Default)]
pub struct ChecksumRendererFactory {
    sums: FrameChecksums,
    failing: Arc<BTreeSet<FrameIndex>>,
    frame_delay: Duration,
}

impl ChecksumRendererFactory {
    /// Factory with no failing frames and no artificial delay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make rendering `frames` fail.
    pub fn with_failing_frames(mut self, frames: impl IntoIterator<Item = FrameIndex>) -> Self {
        self.failing = Arc::new(frames.into_iter().collect());
        self
    }

    /// Sleep `delay` before each frame.
    pub fn with_frame_delay(mut self, delay: Duration) -> Self {
        self.frame_delay = delay;
        self
    }

    /// Checksums recorded by every renderer of this factory.
    pub fn checksums(&self) -> &FrameChecksums {
        &self.sums
    }
}

impl RendererFactory<LayeredDocument> for ChecksumRendererFactory {
    fn create_renderer(
        &self,
        _doc: &LayeredDocument,
    ) -> RegenResult<Box<dyn FrameRenderer<LayeredDocument>>> {
        Ok(Box::new(ChecksumRenderer {
            sums: self.sums.clone(),
            failing: Arc::clone(&self.failing),
            frame_delay: self.frame_delay,
        }))
    }
}

#[cfg(test)]
#[path = "../tests/unit/synthetic.rs"]
mod tests;
