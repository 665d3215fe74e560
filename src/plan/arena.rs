//! Fixed-capacity scratch arena partitioned into named regions.
//!
//! A worker allocates one arena per invocation. The layout is decided by the
//! planner up front; afterwards every access goes through a [`Region`]
//! handle, and [`ScratchArena::parts`] hands out all regions at once as
//! disjoint mutable slices.

use crate::kernel::{Element, IouScratch};
use crate::plan::{BEST_RECORD_LEN, BOX_FIELDS};

/// Logical regions of a worker's scratch arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Region {
    /// Tile score lane (tiled mode only).
    Score,
    /// Tile coordinate lanes, `x1 y1 x2 y2` back to back (tiled mode only).
    Coords,
    /// Four intermediate lanes for the IoU sweep.
    Intermediate,
    /// Current-best record: score, x1, y1, x2, y2.
    Best,
    /// Output staging buffer.
    Staging,
}

/// Offsets and lengths of every region, in elements.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArenaLayout {
    lane_len: usize,
    tiled: bool,
    staging_boxes: usize,
}

impl ArenaLayout {
    /// Layout streaming tiles of `tile_len` through nine lanes.
    pub fn tiled(tile_len: usize, staging_boxes: usize) -> Self {
        Self {
            lane_len: tile_len,
            tiled: true,
            staging_boxes,
        }
    }

    /// Layout with only intermediate lanes of `slice_len`.
    pub fn resident(slice_len: usize, staging_boxes: usize) -> Self {
        Self {
            lane_len: slice_len,
            tiled: false,
            staging_boxes,
        }
    }

    /// Length in elements of `region`.
    pub fn len(&self, region: Region) -> usize {
        match region {
            Region::Score if self.tiled => self.lane_len,
            Region::Coords if self.tiled => 4 * self.lane_len,
            Region::Score | Region::Coords => 0,
            Region::Intermediate => 4 * self.lane_len,
            Region::Best => BEST_RECORD_LEN,
            Region::Staging => self.staging_boxes * BOX_FIELDS,
        }
    }

    /// Start offset in elements of `region`.
    pub fn offset(&self, region: Region) -> usize {
        let order = [
            Region::Score,
            Region::Coords,
            Region::Intermediate,
            Region::Best,
            Region::Staging,
        ];
        order
            .iter()
            .take_while(|&&r| r != region)
            .map(|&r| self.len(r))
            .sum()
    }

    /// Total elements across all regions.
    pub fn total(&self) -> usize {
        self.offset(Region::Staging) + self.len(Region::Staging)
    }
}

/// Every region of an arena, borrowed at once.
pub struct ArenaParts<'a, T> {
    /// Tile score lane; empty in resident mode.
    pub score: &'a mut [T],
    /// Tile coordinate lanes `[x1, y1, x2, y2]`; empty in resident mode.
    pub coords: [&'a mut [T]; 4],
    /// Intermediate lanes for the IoU sweep.
    pub scratch: IouScratch<'a, T>,
    /// Current-best record.
    pub best: &'a mut [T],
    /// Output staging buffer.
    pub staging: &'a mut [T],
}

/// Owned scratch buffer carved into the regions of an [`ArenaLayout`].
pub struct ScratchArena<T> {
    layout: ArenaLayout,
    buf: Vec<T>,
}

impl<T: Element> ScratchArena<T> {
    /// Allocates a zeroed arena for `layout`.
    pub fn new(layout: ArenaLayout) -> Self {
        Self {
            layout,
            buf: vec![T::zero(); layout.total()],
        }
    }

    /// Read-only access to one region.
    pub fn region(&self, region: Region) -> &[T] {
        let start = self.layout.offset(region);
        &self.buf[start..start + self.layout.len(region)]
    }

    /// Mutable access to one region.
    pub fn region_mut(&mut self, region: Region) -> &mut [T] {
        let start = self.layout.offset(region);
        let len = self.layout.len(region);
        &mut self.buf[start..start + len]
    }

    /// Splits the buffer into all regions as disjoint mutable slices.
    pub fn parts(&mut self) -> ArenaParts<'_, T> {
        let lane = self.layout.lane_len;
        let layout = self.layout;
        let rest = self.buf.as_mut_slice();
        let (score, rest) = rest.split_at_mut(layout.len(Region::Score));
        let (coords, rest) = rest.split_at_mut(layout.len(Region::Coords));
        let (inter, rest) = rest.split_at_mut(layout.len(Region::Intermediate));
        let (best, staging) = rest.split_at_mut(layout.len(Region::Best));

        let coord_lane = if layout.tiled { lane } else { 0 };
        let (cx1, rest) = coords.split_at_mut(coord_lane);
        let (cy1, rest) = rest.split_at_mut(coord_lane);
        let (cx2, cy2) = rest.split_at_mut(coord_lane);

        let (ix1, rest) = inter.split_at_mut(lane);
        let (iy1, rest) = rest.split_at_mut(lane);
        let (ix2, iy2) = rest.split_at_mut(lane);

        ArenaParts {
            score,
            coords: [cx1, cy1, cx2, cy2],
            scratch: IouScratch::new([ix1, iy1, ix2, iy2]),
            best,
            staging,
        }
    }
}
