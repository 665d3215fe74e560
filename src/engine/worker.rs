//! Per-worker round loop.
//!
//! Each round a worker finds the maximum over its slice, takes part in the
//! cross-worker reduction, and then sweeps its slice against the winning
//! box. All workers run the same number of rounds and meet at three
//! barriers per round (start, after publishing, after zeroing the winner),
//! so they always agree on whether the loop continues. A worker leaves early
//! only when the group has been aborted.

use crate::engine::output::OutputCompactor;
use crate::engine::reduce::{GroupAborted, RoundExchange};
use crate::geometry::CoordLanes;
use crate::kernel::{Element, IouScratch, Kernel, RoundWinner, TileMut};
use crate::plan::{
    ArenaParts, ExecMode, Region, ScratchArena, TileSpan, TilingPlan, WorkerSlice, BOX_FIELDS,
};
use crate::trace::trace_round;

/// Loop parameters shared by every worker of one invocation.
pub(crate) struct RoundParams<T> {
    pub(crate) keep: usize,
    pub(crate) thresh_iou: T,
    pub(crate) thresh_score: T,
}

/// State owned by one worker for the whole invocation.
pub(crate) struct Worker<'a, T: Element> {
    id: usize,
    slice: WorkerSlice,
    mode: ExecMode,
    tiles: Vec<TileSpan>,
    scores: &'a mut [T],
    coords: CoordLanes<'a, T>,
    arena: ScratchArena<T>,
    output: Option<OutputCompactor<'a, T>>,
    #[cfg_attr(not(feature = "rayon"), allow(dead_code))]
    parallel: bool,
}

impl<'a, T: Element> Worker<'a, T> {
    /// `scores` and `coords` cover exactly the worker's slice.
    pub(crate) fn new(
        id: usize,
        plan: &TilingPlan,
        scores: &'a mut [T],
        coords: CoordLanes<'a, T>,
        output: Option<OutputCompactor<'a, T>>,
        parallel: bool,
    ) -> Self {
        let slice = plan.slices()[id];
        debug_assert_eq!(scores.len(), slice.len);
        debug_assert_eq!(coords.len(), slice.len);
        Self {
            id,
            slice,
            mode: plan.mode(),
            tiles: plan.tiles(slice),
            scores,
            coords,
            arena: ScratchArena::new(plan.arena_layout()),
            output,
            parallel,
        }
    }

    /// Runs all rounds and returns the number of boxes kept.
    pub(crate) fn run<K: Kernel<T>>(
        mut self,
        exchange: &RoundExchange<T>,
        params: &RoundParams<T>,
    ) -> Result<usize, GroupAborted> {
        let mut kept = 0;
        for round in 0..params.keep {
            exchange.rendezvous()?;
            let local = self.local_max::<K>();
            exchange.publish(self.id, local);
            exchange.rendezvous()?;

            let global = exchange.reduce();
            if let Some((owner, winner)) = global {
                if owner == self.id {
                    debug_assert!(self.slice.contains(winner.index));
                    self.scores[winner.index - self.slice.start] = T::zero();
                }
            }
            exchange.rendezvous()?;

            let Some((_, winner)) = global else {
                break;
            };
            if winner.score <= params.thresh_score {
                break;
            }

            self.record(&winner);
            kept += 1;
            if self.output.is_some() {
                trace_round!(round = round, index = winner.index, kept = kept);
            }
            self.suppress::<K>(&winner, params.thresh_iou);
        }

        let staging = self.arena.region_mut(Region::Staging);
        if let Some(output) = self.output.as_mut() {
            output.flush(staging);
            return Ok(output.count());
        }
        Ok(kept)
    }

    /// Maximum over the slice, or `None` when no score exceeds zero.
    fn local_max<K: Kernel<T>>(&mut self) -> Option<RoundWinner<T>> {
        let mut best = T::zero();
        let mut found = None;
        for tile in &self.tiles {
            let valid = &self.scores[tile.offset..tile.offset + tile.len];
            let hit = match self.mode {
                ExecMode::Tiled => {
                    let lane = &mut self.arena.region_mut(Region::Score)[..tile.padded_len];
                    load_lane(lane, valid);
                    K::max_with_index(lane)
                }
                ExecMode::Resident => K::max_with_index(valid),
            };
            if let Some((value, idx)) = hit {
                if value > best {
                    best = value;
                    found = Some(tile.offset + idx);
                }
            }
        }
        found.map(|local| {
            RoundWinner::new(best, self.coords.corners(local), self.slice.start + local)
        })
    }

    /// Stores the winner in the best-record region and appends it to the
    /// output when this worker owns the destination.
    fn record(&mut self, winner: &RoundWinner<T>) {
        let ArenaParts { best, staging, .. } = self.arena.parts();
        let record = [winner.score, winner.x1, winner.y1, winner.x2, winner.y2];
        best[..BOX_FIELDS].copy_from_slice(&record);
        if let Some(output) = self.output.as_mut() {
            output.push(staging, &best[..BOX_FIELDS], winner.index);
        }
    }

    /// Zeroes every candidate of the slice that overlaps `winner` too much.
    fn suppress<K: Kernel<T>>(&mut self, winner: &RoundWinner<T>, thresh_iou: T) {
        let parts = self.arena.parts();
        match self.mode {
            ExecMode::Resident => {
                #[cfg(feature = "rayon")]
                if self.parallel {
                    crate::kernel::rayon::suppress_par::<T, K>(
                        self.scores,
                        self.coords,
                        parts.scratch,
                        winner,
                        thresh_iou,
                    );
                    return;
                }
                K::suppress(
                    TileMut::new(self.scores, self.coords),
                    parts.scratch,
                    winner,
                    thresh_iou,
                );
            }
            ExecMode::Tiled => {
                let ArenaParts {
                    score,
                    coords: [cx1, cy1, cx2, cy2],
                    scratch,
                    ..
                } = parts;
                let [s0, s1, s2, s3] = scratch.lanes;
                for tile in &self.tiles {
                    let (start, len, padded) = (tile.offset, tile.len, tile.padded_len);
                    let window = start..start + len;
                    load_lane(&mut score[..padded], &self.scores[window.clone()]);
                    cx1[..len].copy_from_slice(&self.coords.x1[window.clone()]);
                    cy1[..len].copy_from_slice(&self.coords.y1[window.clone()]);
                    cx2[..len].copy_from_slice(&self.coords.x2[window.clone()]);
                    cy2[..len].copy_from_slice(&self.coords.y2[window.clone()]);

                    let lanes = CoordLanes::from_lanes(
                        &cx1[..padded],
                        &cy1[..padded],
                        &cx2[..padded],
                        &cy2[..padded],
                    );
                    K::suppress(
                        TileMut::new(&mut score[..padded], lanes),
                        IouScratch::new([
                            &mut s0[..padded],
                            &mut s1[..padded],
                            &mut s2[..padded],
                            &mut s3[..padded],
                        ]),
                        winner,
                        thresh_iou,
                    );
                    self.scores[window].copy_from_slice(&score[..len]);
                }
            }
        }
    }
}

/// Copies `src` into the front of `lane` and zero-fills the padding.
fn load_lane<T: Element>(lane: &mut [T], src: &[T]) {
    let (head, pad) = lane.split_at_mut(src.len());
    head.copy_from_slice(src);
    pad.iter_mut().for_each(|v| *v = T::zero());
}
