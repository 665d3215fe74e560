//! Numeric element types and the selection/suppression kernels.
//!
//! A kernel provides the two vectorized primitives the engine needs per
//! tile: a first-found max-with-index reduction over the score lane, and the
//! IoU suppression sweep against the round's winning box. Every kernel must
//! evaluate the overlap with the relu identities
//! `max(a, b) = relu(a - b) + b` and `min(a, b) = b - relu(b - a)`, in the
//! same operation order as [`overlap_exceeds`], so that kernels agree bit for
//! bit on `f32`.

use std::fmt::Debug;

use num_traits::Float;

use crate::geometry::CoordLanes;
use crate::util::math::relu;

pub mod batch;
pub mod scalar;

#[cfg(feature = "simd")]
pub mod simd;

#[cfg(feature = "rayon")]
pub mod rayon;

/// Floating-point type a candidate set can be stored in.
pub trait Element: Float + Send + Sync + Debug + 'static {
    /// Kernel used when the caller does not pick one explicitly.
    type Kernel: Kernel<Self>;

    /// Short type name for diagnostics.
    const NAME: &'static str;

    /// Converts from `f32`, rounding if the type is narrower.
    fn from_f32(value: f32) -> Self;

    /// Widens to `f32`.
    fn as_f32(self) -> f32;
}

impl Element for f32 {
    #[cfg(feature = "simd")]
    type Kernel = simd::SimdKernel;
    #[cfg(not(feature = "simd"))]
    type Kernel = scalar::ScalarKernel;

    const NAME: &'static str = "f32";

    #[inline]
    fn from_f32(value: f32) -> Self {
        value
    }

    #[inline]
    fn as_f32(self) -> f32 {
        self
    }
}

#[cfg(feature = "f16")]
impl Element for half::f16 {
    type Kernel = scalar::ScalarKernel;

    const NAME: &'static str = "f16";

    #[inline]
    fn from_f32(value: f32) -> Self {
        half::f16::from_f32(value)
    }

    #[inline]
    fn as_f32(self) -> f32 {
        self.to_f32()
    }
}

/// The box selected in the current round, with its precomputed area.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RoundWinner<T> {
    /// Score observed at selection time.
    pub score: T,
    /// Left edge.
    pub x1: T,
    /// Top edge.
    pub y1: T,
    /// Right edge.
    pub x2: T,
    /// Bottom edge.
    pub y2: T,
    /// `(x2 - x1) * (y2 - y1)` of the winner.
    pub area: T,
    /// Global index into the candidate set.
    pub index: usize,
}

impl<T: Element> RoundWinner<T> {
    /// Builds a winner record from a score, its corners and global index.
    pub fn new(score: T, corners: [T; 4], index: usize) -> Self {
        let [x1, y1, x2, y2] = corners;
        Self {
            score,
            x1,
            y1,
            x2,
            y2,
            area: (x2 - x1) * (y2 - y1),
            index,
        }
    }
}

/// One tile of candidates as seen by a kernel: a mutable score lane and the
/// matching read-only coordinate lanes, all of the same length.
pub struct TileMut<'a, T> {
    pub(crate) scores: &'a mut [T],
    pub(crate) coords: CoordLanes<'a, T>,
}

impl<'a, T: Element> TileMut<'a, T> {
    /// Pairs a score lane with coordinate lanes of equal length.
    pub fn new(scores: &'a mut [T], coords: CoordLanes<'a, T>) -> Self {
        debug_assert_eq!(scores.len(), coords.len());
        Self { scores, coords }
    }

    /// Number of candidates in the tile.
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Returns true when the tile is empty.
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Four intermediate lanes a kernel may use as scratch during suppression.
pub struct IouScratch<'a, T> {
    pub(crate) lanes: [&'a mut [T]; 4],
}

impl<'a, T: Element> IouScratch<'a, T> {
    /// Wraps four scratch lanes, each at least as long as the tile.
    pub fn new(lanes: [&'a mut [T]; 4]) -> Self {
        Self { lanes }
    }
}

/// Kernel trait for per-tile reduction and suppression.
pub trait Kernel<T: Element>: 'static {
    /// Returns the first index holding the maximum score, or `None` when the
    /// lane is empty or holds only NaN.
    fn max_with_index(scores: &[T]) -> Option<(T, usize)>;

    /// Zeroes the score of every candidate whose overlap with `winner`
    /// exceeds `thresh_iou`.
    fn suppress(
        tile: TileMut<'_, T>,
        scratch: IouScratch<'_, T>,
        winner: &RoundWinner<T>,
        thresh_iou: T,
    );
}

/// Per-candidate reference of the suppression test.
///
/// Returns true when `inter > thresh_iou * union`, i.e. when the candidate
/// must be suppressed.
#[inline]
pub fn overlap_exceeds<T: Element>(
    winner: &RoundWinner<T>,
    corners: [T; 4],
    thresh_iou: T,
) -> bool {
    let [x1, y1, x2, y2] = corners;
    let inter_x1 = relu(x1 - winner.x1) + winner.x1;
    let inter_x2 = winner.x2 - relu(winner.x2 - x2);
    let inter_w = relu(inter_x2 - inter_x1);
    let inter_y1 = relu(y1 - winner.y1) + winner.y1;
    let inter_y2 = winner.y2 - relu(winner.y2 - y2);
    let inter_h = relu(inter_y2 - inter_y1);
    let inter = inter_w * inter_h;
    let area = (x2 - x1) * (y2 - y1);
    let union = area + winner.area - inter;
    !(inter <= union * thresh_iou)
}
