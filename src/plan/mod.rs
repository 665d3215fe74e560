//! Tiling planner: worker partition, tile geometry and fast-path selection.
//!
//! The planner runs once per invocation. It splits the candidate range into
//! one contiguous slice per worker, then sizes the tile each worker streams
//! through its scratch arena. When the candidates already sit in local memory
//! and fit untiled, it selects resident mode instead and no copying happens.

use std::mem::size_of;

use crate::kernel::Element;
use crate::util::math::{align_down, align_up};
use crate::util::{NmsError, NmsResult};

pub mod arena;

pub use arena::{ArenaLayout, ArenaParts, Region, ScratchArena};

/// Vector alignment, in elements, for tile lengths and padding.
pub const ALIGN: usize = 64;

/// Elements reserved for the current-best record.
pub const BEST_RECORD_LEN: usize = ALIGN;

/// Boxes held in the output staging buffer before a flush.
pub const STAGING_CAPACITY: usize = 256;

/// Fields per output box: score, x1, y1, x2, y2.
pub const BOX_FIELDS: usize = 5;

/// Scratch lanes per tile in tiled mode: score, four coordinates and four
/// intermediates.
pub const TILED_LANES: usize = 9;

/// Intermediate lanes used in resident mode.
pub const RESIDENT_LANES: usize = 4;

/// Memory tier holding a buffer.
///
/// Tiers only steer planning: candidates in `Local` memory may be used in
/// place, and a `Local` destination is written without staging.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MemoryTier {
    /// Slow main memory.
    #[default]
    Main,
    /// Medium-latency memory shared by the worker group.
    Shared,
    /// Fast per-worker scratch memory.
    Local,
}

impl MemoryTier {
    /// Returns a lowercase name for diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryTier::Main => "main",
            MemoryTier::Shared => "shared",
            MemoryTier::Local => "local",
        }
    }
}

/// How a worker reaches its candidates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecMode {
    /// Stream the slice tile by tile through the scratch arena.
    Tiled,
    /// Operate directly on the caller's arrays, one tile per slice.
    Resident,
}

impl ExecMode {
    /// Returns a lowercase name for diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecMode::Tiled => "tiled",
            ExecMode::Resident => "resident",
        }
    }
}

/// Contiguous range of candidates owned by one worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerSlice {
    /// Global index of the first candidate.
    pub start: usize,
    /// Number of candidates.
    pub len: usize,
}

impl WorkerSlice {
    /// One past the last global index.
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    /// Returns true when `index` falls inside the slice.
    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index < self.end()
    }
}

/// One tile of a worker's slice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileSpan {
    /// Offset from the start of the worker slice.
    pub offset: usize,
    /// Valid candidates to copy in and out.
    pub len: usize,
    /// Length the kernels run over, padded to alignment in tiled mode.
    pub padded_len: usize,
}

/// Inputs to the planner.
#[derive(Clone, Copy, Debug)]
pub struct PlanRequest {
    /// Candidate count.
    pub count: usize,
    /// Worker count.
    pub workers: usize,
    /// Per-worker scratch capacity in bytes.
    pub scratch_bytes: usize,
    /// Tier the candidate arrays live in.
    pub source: MemoryTier,
    /// Boxes the output staging buffer must hold (0 for direct writes).
    pub staging_boxes: usize,
}

/// Geometry shared by every worker of one invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct TilingPlan {
    mode: ExecMode,
    tile_len: usize,
    staging_boxes: usize,
    slices: Vec<WorkerSlice>,
}

impl TilingPlan {
    /// Computes the partition and tile geometry for `request`.
    ///
    /// Fails with [`NmsError::ScratchTooSmall`] when the scratch cannot hold
    /// one aligned tile in tiled mode.
    pub fn new<T: Element>(request: PlanRequest) -> NmsResult<Self> {
        if request.workers == 0 {
            return Err(NmsError::InvalidWorkerCount { workers: 0 });
        }
        let elem = size_of::<T>();
        let slices = partition(request.count, request.workers);
        let widest = slices.iter().map(|s| s.len).max().unwrap_or(0);
        let staging = request.staging_boxes * BOX_FIELDS;
        let reserved = BEST_RECORD_LEN + staging;

        let resident_bytes = (RESIDENT_LANES * widest + reserved) * elem;
        let resident = request.source == MemoryTier::Local
            && request.count % ALIGN == 0
            && request.scratch_bytes > resident_bytes;
        if resident {
            return Ok(Self {
                mode: ExecMode::Resident,
                tile_len: widest,
                staging_boxes: request.staging_boxes,
                slices,
            });
        }

        let cap_elems = request.scratch_bytes / elem;
        let limit = cap_elems.saturating_sub(reserved) / TILED_LANES;
        let tile_len = align_down(limit, ALIGN);
        if tile_len == 0 {
            return Err(NmsError::ScratchTooSmall {
                needed: (TILED_LANES * ALIGN + reserved) * elem,
                got: request.scratch_bytes,
            });
        }
        Ok(Self {
            mode: ExecMode::Tiled,
            tile_len,
            staging_boxes: request.staging_boxes,
            slices,
        })
    }

    /// Selected execution mode.
    pub fn mode(&self) -> ExecMode {
        self.mode
    }

    /// Full tile length (the widest slice in resident mode).
    pub fn tile_len(&self) -> usize {
        self.tile_len
    }

    /// Per-worker slices, in worker order.
    pub fn slices(&self) -> &[WorkerSlice] {
        &self.slices
    }

    /// Full tiles in `slice`.
    pub fn repeat(&self, slice: WorkerSlice) -> usize {
        match self.mode {
            ExecMode::Tiled => slice.len / self.tile_len,
            ExecMode::Resident => 0,
        }
    }

    /// Candidates left over after the full tiles of `slice`.
    pub fn remain(&self, slice: WorkerSlice) -> usize {
        match self.mode {
            ExecMode::Tiled => slice.len % self.tile_len,
            ExecMode::Resident => slice.len,
        }
    }

    /// Tiles covering `slice`, full tiles first, then the padded remainder.
    pub fn tiles(&self, slice: WorkerSlice) -> Vec<TileSpan> {
        let repeat = self.repeat(slice);
        let remain = self.remain(slice);
        let mut spans = Vec::with_capacity(repeat + 1);
        for i in 0..repeat {
            spans.push(TileSpan {
                offset: i * self.tile_len,
                len: self.tile_len,
                padded_len: self.tile_len,
            });
        }
        if remain > 0 {
            let padded_len = match self.mode {
                ExecMode::Tiled => align_up(remain, ALIGN),
                ExecMode::Resident => remain,
            };
            spans.push(TileSpan {
                offset: repeat * self.tile_len,
                len: remain,
                padded_len,
            });
        }
        spans
    }

    /// Arena layout each worker allocates under this plan.
    pub fn arena_layout(&self) -> ArenaLayout {
        match self.mode {
            ExecMode::Tiled => ArenaLayout::tiled(self.tile_len, self.staging_boxes),
            ExecMode::Resident => ArenaLayout::resident(self.tile_len, self.staging_boxes),
        }
    }
}

/// Splits `count` candidates into `workers` contiguous slices; the first
/// `count % workers` slices get one extra candidate.
pub fn partition(count: usize, workers: usize) -> Vec<WorkerSlice> {
    if workers == 0 {
        return Vec::new();
    }
    let base = count / workers;
    let extra = count % workers;
    (0..workers)
        .map(|id| WorkerSlice {
            start: base * id + id.min(extra),
            len: base + usize::from(id < extra),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{partition, ExecMode, MemoryTier, PlanRequest, TilingPlan, WorkerSlice, ALIGN};
    use crate::util::NmsError;

    fn request(count: usize, workers: usize, scratch_bytes: usize) -> PlanRequest {
        PlanRequest {
            count,
            workers,
            scratch_bytes,
            source: MemoryTier::Main,
            staging_boxes: 256,
        }
    }

    #[test]
    fn partition_balances_remainder_to_low_workers() {
        let slices = partition(10, 4);
        assert_eq!(
            slices,
            vec![
                WorkerSlice { start: 0, len: 3 },
                WorkerSlice { start: 3, len: 3 },
                WorkerSlice { start: 6, len: 2 },
                WorkerSlice { start: 8, len: 2 },
            ]
        );
        assert_eq!(partition(3, 4).iter().map(|s| s.len).sum::<usize>(), 3);
        assert_eq!(partition(0, 1), vec![WorkerSlice { start: 0, len: 0 }]);
    }

    #[test]
    fn tile_len_fits_scratch_after_reservations() {
        // (4096 - 64 - 1280) / 9 = 305 -> 256
        let plan = TilingPlan::new::<f32>(request(1000, 1, 4096 * 4)).unwrap();
        assert_eq!(plan.mode(), ExecMode::Tiled);
        assert_eq!(plan.tile_len(), 256);

        let slice = plan.slices()[0];
        assert_eq!(plan.repeat(slice), 3);
        assert_eq!(plan.remain(slice), 232);
        let tiles = plan.tiles(slice);
        assert_eq!(tiles.len(), 4);
        assert_eq!(tiles[3].offset, 768);
        assert_eq!(tiles[3].padded_len, 256);
    }

    #[test]
    fn remainder_pads_to_alignment() {
        let plan = TilingPlan::new::<f32>(request(70, 1, 64 * 1024)).unwrap();
        let tiles = plan.tiles(plan.slices()[0]);
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].len, 70);
        assert_eq!(tiles[0].padded_len, 2 * ALIGN);
    }

    #[test]
    fn resident_mode_requires_local_aligned_and_roomy() {
        let mut req = request(128, 1, 64 * 1024);
        req.source = MemoryTier::Local;
        let plan = TilingPlan::new::<f32>(req).unwrap();
        assert_eq!(plan.mode(), ExecMode::Resident);
        assert_eq!(plan.tiles(plan.slices()[0]).len(), 1);

        req.count = 127;
        assert_eq!(TilingPlan::new::<f32>(req).unwrap().mode(), ExecMode::Tiled);

        req.count = 128;
        req.source = MemoryTier::Shared;
        assert_eq!(TilingPlan::new::<f32>(req).unwrap().mode(), ExecMode::Tiled);
    }

    #[test]
    fn undersized_scratch_is_rejected() {
        let err = TilingPlan::new::<f32>(request(10, 1, 1024)).err().unwrap();
        assert_eq!(
            err,
            NmsError::ScratchTooSmall {
                needed: (9 * 64 + 64 + 1280) * 4,
                got: 1024,
            }
        );
    }
}
