//! SIMD kernel for `f32` candidates using the `wide` crate.
//!
//! The IoU sweep is fused: each group of 8 candidates is evaluated entirely
//! in registers with `f32x8`, issuing the same relu-identity operations in
//! the same order as the scalar kernel, so both kernels keep or suppress
//! exactly the same candidates.

use crate::kernel::batch::first_max;
use crate::kernel::{overlap_exceeds, IouScratch, Kernel, RoundWinner, TileMut};
use wide::f32x8;

const LANES: usize = 8;

/// Load 8 f32 values into f32x8.
#[inline]
fn load_f32x8(slice: &[f32]) -> f32x8 {
    f32x8::from([
        slice[0], slice[1], slice[2], slice[3], slice[4], slice[5], slice[6], slice[7],
    ])
}

/// Horizontal max of f32x8.
#[inline]
fn hmax(v: f32x8) -> f32 {
    v.to_array().into_iter().fold(f32::NEG_INFINITY, f32::max)
}

/// SIMD-accelerated kernel for `f32` lanes.
pub struct SimdKernel;

impl Kernel<f32> for SimdKernel {
    fn max_with_index(scores: &[f32]) -> Option<(f32, usize)> {
        if scores.len() < LANES || scores.iter().any(|s| s.is_nan()) {
            return first_max(scores);
        }

        let simd_end = scores.len() / LANES * LANES;
        let mut acc = load_f32x8(scores);
        let mut i = LANES;
        while i < simd_end {
            acc = acc.max(load_f32x8(&scores[i..]));
            i += LANES;
        }
        let mut best = hmax(acc);
        for &s in &scores[simd_end..] {
            if s > best {
                best = s;
            }
        }

        // first occurrence keeps the lowest-index tie-break
        scores
            .iter()
            .position(|&s| s == best)
            .map(|idx| (best, idx))
    }

    fn suppress(
        tile: TileMut<'_, f32>,
        _scratch: IouScratch<'_, f32>,
        winner: &RoundWinner<f32>,
        thresh_iou: f32,
    ) {
        let TileMut { scores, coords } = tile;
        let len = scores.len();
        let simd_end = len / LANES * LANES;

        let zero = f32x8::ZERO;
        let mx1 = f32x8::splat(winner.x1);
        let my1 = f32x8::splat(winner.y1);
        let mx2 = f32x8::splat(winner.x2);
        let my2 = f32x8::splat(winner.y2);
        let marea = f32x8::splat(winner.area);
        let thresh = f32x8::splat(thresh_iou);

        let mut i = 0;
        while i < simd_end {
            let x1 = load_f32x8(&coords.x1[i..]);
            let y1 = load_f32x8(&coords.y1[i..]);
            let x2 = load_f32x8(&coords.x2[i..]);
            let y2 = load_f32x8(&coords.y2[i..]);

            let inter_x1 = (x1 - mx1).max(zero) + mx1;
            let inter_x2 = mx2 - (mx2 - x2).max(zero);
            let inter_w = (inter_x2 - inter_x1).max(zero);
            let inter_y1 = (y1 - my1).max(zero) + my1;
            let inter_y2 = my2 - (my2 - y2).max(zero);
            let inter_h = (inter_y2 - inter_y1).max(zero);
            let inter = inter_w * inter_h;
            let area = (x2 - x1) * (y2 - y1);
            let limit = (area + marea - inter) * thresh;

            let inter = inter.to_array();
            let limit = limit.to_array();
            for lane in 0..LANES {
                if !(inter[lane] <= limit[lane]) {
                    scores[i + lane] = 0.0;
                }
            }
            i += LANES;
        }

        // Scalar remainder
        while i < len {
            if overlap_exceeds(winner, coords.corners(i), thresh_iou) {
                scores[i] = 0.0;
            }
            i += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SimdKernel;
    use crate::geometry::CoordLanes;
    use crate::kernel::scalar::ScalarKernel;
    use crate::kernel::{IouScratch, Kernel, RoundWinner, TileMut};

    #[test]
    fn simd_matches_scalar_on_mixed_tile() {
        let n = 21;
        let mut coords = vec![0.0f32; 4 * n];
        for i in 0..n {
            let f = i as f32;
            coords[i] = f * 0.7;
            coords[n + i] = (f * 1.3) % 9.0;
            coords[2 * n + i] = f * 0.7 + 6.0 + (i % 3) as f32;
            coords[3 * n + i] = (f * 1.3) % 9.0 + 5.0;
        }
        let lanes = CoordLanes::new(&coords, n, n).unwrap();
        let winner = RoundWinner::new(0.95f32, [4.0, 2.0, 11.0, 8.0], 3);

        let mut simd_scores = vec![0.5f32; n];
        let mut scalar_scores = vec![0.5f32; n];
        let mut scratch = vec![0.0f32; 4 * n];
        {
            let (a, rest) = scratch.split_at_mut(n);
            let (b, rest) = rest.split_at_mut(n);
            let (c, d) = rest.split_at_mut(n);
            <SimdKernel as Kernel<f32>>::suppress(
                TileMut::new(&mut simd_scores, lanes),
                IouScratch::new([a, b, c, d]),
                &winner,
                0.25,
            );
        }
        let (a, rest) = scratch.split_at_mut(n);
        let (b, rest) = rest.split_at_mut(n);
        let (c, d) = rest.split_at_mut(n);
        <ScalarKernel as Kernel<f32>>::suppress(
            TileMut::new(&mut scalar_scores, lanes),
            IouScratch::new([a, b, c, d]),
            &winner,
            0.25,
        );
        assert_eq!(simd_scores, scalar_scores);
        assert!(simd_scores.iter().any(|&s| s == 0.0));
    }

    #[test]
    fn simd_max_keeps_first_index() {
        let mut scores = vec![0.1f32; 19];
        scores[4] = 0.8;
        scores[12] = 0.8;
        assert_eq!(
            <SimdKernel as Kernel<f32>>::max_with_index(&scores),
            Some((0.8, 4))
        );
    }
}
