//! Rayon-parallel suppression sweep (feature-gated).
//!
//! Within a round every candidate's fate depends only on the fixed winning
//! box, so a resident slice can be cut into aligned chunks and swept on the
//! rayon pool in any order.

use crate::geometry::CoordLanes;
use crate::kernel::{Element, IouScratch, Kernel, RoundWinner, TileMut};
use crate::plan::ALIGN;
use rayon::prelude::*;

/// Candidates per parallel task.
pub const PAR_CHUNK: usize = 16 * ALIGN;

/// Chunk-parallel IoU suppression over one contiguous slice.
///
/// `scores`, `coords` and the scratch lanes are cut at the same chunk
/// boundaries; each chunk runs the sequential kernel `K`.
pub fn suppress_par<T: Element, K: Kernel<T>>(
    scores: &mut [T],
    coords: CoordLanes<'_, T>,
    scratch: IouScratch<'_, T>,
    winner: &RoundWinner<T>,
    thresh_iou: T,
) {
    let len = scores.len();
    let [s0, s1, s2, s3] = scratch.lanes;
    scores
        .par_chunks_mut(PAR_CHUNK)
        .zip(s0[..len].par_chunks_mut(PAR_CHUNK))
        .zip(s1[..len].par_chunks_mut(PAR_CHUNK))
        .zip(s2[..len].par_chunks_mut(PAR_CHUNK))
        .zip(s3[..len].par_chunks_mut(PAR_CHUNK))
        .enumerate()
        .for_each(|(chunk_idx, ((((chunk, a), b), c), d))| {
            let lanes = coords.slice(chunk_idx * PAR_CHUNK, chunk.len());
            K::suppress(
                TileMut::new(chunk, lanes),
                IouScratch::new([a, b, c, d]),
                winner,
                thresh_iou,
            );
        });
}
