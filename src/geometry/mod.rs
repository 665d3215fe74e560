//! Boxes and candidate storage.
//!
//! Candidates live in parallel arrays: one score array, and one contiguous
//! coordinate region holding four lanes (`x1`, `y1`, `x2`, `y2`) that start
//! `stride` elements apart. A stride larger than the candidate count
//! represents padded lanes, exactly like a padded image row.

use crate::kernel::Element;
use crate::plan::ALIGN;
use crate::util::math::align_up;
use crate::util::{NmsError, NmsResult};

/// A scored axis-aligned box `(score, x1, y1, x2, y2)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoredBox<T> {
    /// Confidence score.
    pub score: T,
    /// Left edge.
    pub x1: T,
    /// Top edge.
    pub y1: T,
    /// Right edge.
    pub x2: T,
    /// Bottom edge.
    pub y2: T,
}

impl<T: Element> ScoredBox<T> {
    /// Creates a box from its score and corner coordinates.
    pub fn new(score: T, x1: T, y1: T, x2: T, y2: T) -> Self {
        Self {
            score,
            x1,
            y1,
            x2,
            y2,
        }
    }

    /// Returns `(x2 - x1) * (y2 - y1)` without clamping.
    pub fn area(&self) -> T {
        (self.x2 - self.x1) * (self.y2 - self.y1)
    }

    /// Returns the fields in interleaved output order.
    pub fn to_array(&self) -> [T; 5] {
        [self.score, self.x1, self.y1, self.x2, self.y2]
    }
}

/// Intersection-over-union of two boxes, computed in `f32`.
///
/// Returns zero when the union is not positive.
pub fn iou<T: Element>(a: &ScoredBox<T>, b: &ScoredBox<T>) -> f32 {
    let iw = (a.x2.as_f32().min(b.x2.as_f32()) - a.x1.as_f32().max(b.x1.as_f32())).max(0.0);
    let ih = (a.y2.as_f32().min(b.y2.as_f32()) - a.y1.as_f32().max(b.y1.as_f32())).max(0.0);
    let inter = iw * ih;
    let union = a.area().as_f32() + b.area().as_f32() - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

/// Borrowed read-only view of the four coordinate lanes.
#[derive(Clone, Copy, Debug)]
pub struct CoordLanes<'a, T> {
    pub(crate) x1: &'a [T],
    pub(crate) y1: &'a [T],
    pub(crate) x2: &'a [T],
    pub(crate) y2: &'a [T],
}

impl<'a, T: Element> CoordLanes<'a, T> {
    /// Splits a strided coordinate region into lanes of `count` elements.
    pub fn new(coords: &'a [T], count: usize, stride: usize) -> NmsResult<Self> {
        if stride < count {
            return Err(NmsError::InvalidStride { count, stride });
        }
        let needed = if count == 0 { 0 } else { 3 * stride + count };
        if coords.len() < needed {
            return Err(NmsError::BufferTooSmall {
                what: "coordinate",
                needed,
                got: coords.len(),
            });
        }
        let lane = move |k: usize| -> &'a [T] {
            if count == 0 {
                &coords[..0]
            } else {
                &coords[k * stride..k * stride + count]
            }
        };
        Ok(Self {
            x1: lane(0),
            y1: lane(1),
            x2: lane(2),
            y2: lane(3),
        })
    }

    /// Wraps four equally long lanes.
    pub(crate) fn from_lanes(x1: &'a [T], y1: &'a [T], x2: &'a [T], y2: &'a [T]) -> Self {
        debug_assert!(x1.len() == y1.len() && x1.len() == x2.len() && x1.len() == y2.len());
        Self { x1, y1, x2, y2 }
    }

    /// Number of candidates covered by each lane.
    pub fn len(&self) -> usize {
        self.x1.len()
    }

    /// Returns true when the lanes are empty.
    pub fn is_empty(&self) -> bool {
        self.x1.is_empty()
    }

    /// Fetches `(x1, y1, x2, y2)` of one candidate.
    #[inline]
    pub fn corners(&self, index: usize) -> [T; 4] {
        [
            self.x1[index],
            self.y1[index],
            self.x2[index],
            self.y2[index],
        ]
    }

    /// Narrows every lane to `start..start + len`.
    pub(crate) fn slice(&self, start: usize, len: usize) -> Self {
        Self {
            x1: &self.x1[start..start + len],
            y1: &self.y1[start..start + len],
            x2: &self.x2[start..start + len],
            y2: &self.y2[start..start + len],
        }
    }
}

/// Owned candidate set: scores plus a strided coordinate region.
///
/// The set is mutated in place by an invocation: selected and suppressed
/// candidates have their score zeroed.
#[derive(Clone, Debug)]
pub struct CandidateSet<T> {
    count: usize,
    stride: usize,
    scores: Vec<T>,
    coords: Vec<T>,
}

impl<T: Element> CandidateSet<T> {
    /// Builds a tightly packed set (`stride == count`).
    pub fn from_boxes(boxes: &[ScoredBox<T>]) -> Self {
        Self::with_stride(boxes, boxes.len())
    }

    /// Builds a set whose lanes are padded to a multiple of the vector
    /// alignment; padding scores are zero.
    pub fn from_boxes_padded(boxes: &[ScoredBox<T>]) -> Self {
        Self::with_stride(boxes, align_up(boxes.len(), ALIGN))
    }

    fn with_stride(boxes: &[ScoredBox<T>], stride: usize) -> Self {
        let count = boxes.len();
        let mut scores = vec![T::zero(); stride];
        let mut coords = vec![T::zero(); 4 * stride];
        for (idx, b) in boxes.iter().enumerate() {
            scores[idx] = b.score;
            coords[idx] = b.x1;
            coords[stride + idx] = b.y1;
            coords[2 * stride + idx] = b.x2;
            coords[3 * stride + idx] = b.y2;
        }
        Self {
            count,
            stride,
            scores,
            coords,
        }
    }

    /// Wraps existing buffers after checking their lengths.
    pub fn from_parts(
        scores: Vec<T>,
        coords: Vec<T>,
        count: usize,
        stride: usize,
    ) -> NmsResult<Self> {
        if scores.len() < count {
            return Err(NmsError::BufferTooSmall {
                what: "score",
                needed: count,
                got: scores.len(),
            });
        }
        CoordLanes::new(&coords, count, stride)?;
        Ok(Self {
            count,
            stride,
            scores,
            coords,
        })
    }

    /// Number of live candidates.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true when the set holds no candidates.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Distance in elements between coordinate lanes.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Score array including any padding.
    pub fn scores(&self) -> &[T] {
        &self.scores
    }

    /// Coordinate region including any padding.
    pub fn coords(&self) -> &[T] {
        &self.coords
    }

    /// Returns candidate `index` with its current score.
    pub fn get(&self, index: usize) -> Option<ScoredBox<T>> {
        if index >= self.count {
            return None;
        }
        let s = self.stride;
        Some(ScoredBox {
            score: self.scores[index],
            x1: self.coords[index],
            y1: self.coords[s + index],
            x2: self.coords[2 * s + index],
            y2: self.coords[3 * s + index],
        })
    }

    /// Borrows the set as the buffers an invocation runs on.
    pub fn as_view_mut(&mut self) -> CandidateView<'_, T> {
        CandidateView {
            scores: &mut self.scores,
            coords: &self.coords,
            count: self.count,
            stride: self.stride,
        }
    }
    /// Borrows the set with its padding counted as candidates.
    ///
    /// Padding scores are zero and never win a round, so the selection is
    /// the same as [`as_view_mut`](Self::as_view_mut); an aligned count lets
    /// a local-tier set run resident.
    pub fn as_padded_view_mut(&mut self) -> CandidateView<'_, T> {
        CandidateView {
            scores: &mut self.scores,
            coords: &self.coords,
            count: self.stride,
            stride: self.stride,
        }
    }
}

/// Caller-owned candidate buffers for one invocation.
///
/// `scores` holds at least `count` entries (more when padded to `stride`);
/// `coords` holds four lanes starting `stride` elements apart.
#[derive(Debug)]
pub struct CandidateView<'a, T> {
    /// Score array, zeroed in place as candidates are selected or suppressed.
    pub scores: &'a mut [T],
    /// Coordinate region `x1 | y1 | x2 | y2`.
    pub coords: &'a [T],
    /// Number of live candidates.
    pub count: usize,
    /// Distance in elements between coordinate lanes.
    pub stride: usize,
}

impl<'a, T: Element> CandidateView<'a, T> {
    /// Bundles raw buffers; lengths are checked when an invocation starts.
    pub fn new(scores: &'a mut [T], coords: &'a [T], count: usize, stride: usize) -> Self {
        Self {
            scores,
            coords,
            count,
            stride,
        }
    }
}
