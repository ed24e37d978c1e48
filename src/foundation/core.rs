use crate::foundation::error::{RegenError, RegenResult};
use smallvec::SmallVec;

/// Absolute 0-based frame index in animation timeline space.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

impl std::fmt::Display for FrameIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Half-open frame range `[start, end)` in timeline space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameRange {
    /// Inclusive range start.
    pub start: FrameIndex,
    /// Exclusive range end.
    pub end: FrameIndex, // exclusive
}

impl FrameRange {
    /// Create a validated range with `start <= end`.
    pub fn new(start: FrameIndex, end: FrameIndex) -> RegenResult<Self> {
        if start.0 > end.0 {
            return Err(RegenError::validation("FrameRange start must be <= end"));
        }
        Ok(Self { start, end })
    }

    /// Number of frames contained in the range.
    pub fn len_frames(self) -> u64 {
        self.end.0.saturating_sub(self.start.0)
    }

    /// Return `true` when the range has no frames.
    pub fn is_empty(self) -> bool {
        self.start.0 == self.end.0
    }

    /// Return `true` when `f` is inside `[start, end)`.
    pub fn contains(self, f: FrameIndex) -> bool {
        self.start.0 <= f.0 && f.0 < self.end.0
    }

    /// Iterate the frames of the range in ascending order.
    pub fn frames(self) -> impl Iterator<Item = FrameIndex> {
        (self.start.0..self.end.0).map(FrameIndex)
    }

    /// Parse `"a..b"` (half-open) or a single frame `"a"`.
    pub fn parse(s: &str) -> RegenResult<Self> {
        let parse_idx = |v: &str| {
            v.trim()
                .parse::<u64>()
                .map(FrameIndex)
                .map_err(|e| RegenError::validation(format!("invalid frame index '{v}': {e}")))
        };
        match s.split_once("..") {
            Some((a, b)) => Self::new(parse_idx(a)?, parse_idx(b)?),
            None => {
                let f = parse_idx(s)?;
                Self::new(f, FrameIndex(f.0.saturating_add(1)))
            }
        }
    }
}

/// Integer pixel rectangle, `x`/`y` at the top-left corner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct IntRect {
    /// Left edge in pixels.
    pub x: i32,
    /// Top edge in pixels.
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl IntRect {
    /// Create a rectangle from its origin and size.
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Return `true` when the rectangle covers no pixels.
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    fn right(self) -> i64 {
        i64::from(self.x) + i64::from(self.width)
    }

    fn bottom(self) -> i64 {
        i64::from(self.y) + i64::from(self.height)
    }

    /// Smallest rectangle containing both `self` and `other`.
    ///
    /// Empty rectangles are ignored.
    pub fn united(self, other: IntRect) -> IntRect {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let r = self.right().max(other.right());
        let b = self.bottom().max(other.bottom());
        IntRect::new(x, y, clamp_len(r - i64::from(x)), clamp_len(b - i64::from(y)))
    }

    /// Overlap of `self` and `other`; empty when they do not intersect.
    pub fn intersected(self, other: IntRect) -> IntRect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let r = self.right().min(other.right());
        let b = self.bottom().min(other.bottom());
        if r <= i64::from(x) || b <= i64::from(y) {
            return IntRect::default();
        }
        IntRect::new(x, y, clamp_len(r - i64::from(x)), clamp_len(b - i64::from(y)))
    }
}

fn clamp_len(v: i64) -> u32 {
    u32::try_from(v.max(0)).unwrap_or(u32::MAX)
}

/// Area of each frame that gets regenerated.
///
/// A union of rectangles. An empty region means "the whole frame".
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Region {
    rects: SmallVec<[IntRect; 4]>,
}

impl Region {
    /// An empty region (whole frame).
    pub fn new() -> Self {
        Self::default()
    }

    /// Region covering exactly `rect`.
    pub fn from_rect(rect: IntRect) -> Self {
        let mut r = Self::new();
        r.add_rect(rect);
        r
    }

    /// Add `rect` to the region. Empty rectangles are dropped.
    pub fn add_rect(&mut self, rect: IntRect) {
        if !rect.is_empty() {
            self.rects.push(rect);
        }
    }

    /// Return `true` when no rectangle is set, i.e. the whole frame is regenerated.
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Rectangles making up the region.
    pub fn rects(&self) -> &[IntRect] {
        &self.rects
    }

    /// Bounding rectangle of the region, `None` for the whole-frame region.
    pub fn bounding_rect(&self) -> Option<IntRect> {
        if self.is_empty() {
            return None;
        }
        Some(
            self.rects
                .iter()
                .fold(IntRect::default(), |acc, r| acc.united(*r)),
        )
    }

    /// Resolve the area to regenerate inside a `bounds` frame.
    ///
    /// The whole-frame region resolves to `bounds` itself.
    pub fn resolve(&self, bounds: IntRect) -> IntRect {
        match self.bounding_rect() {
            None => bounds,
            Some(r) => r.intersected(bounds),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
