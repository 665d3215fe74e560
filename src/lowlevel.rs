//! Low-level building blocks for custom suppression pipelines.
//!
//! These expose the planner, the scratch arena and the kernel primitives for
//! callers driving their own loops. Most users should prefer
//! [`nms_detection`](crate::nms_detection) or [`Nms`](crate::Nms).

pub use crate::geometry::CoordLanes;
pub use crate::kernel::batch::{first_max, max_relu, min_relu, zero_where_greater};
pub use crate::kernel::scalar::ScalarKernel;
#[cfg(feature = "simd")]
pub use crate::kernel::simd::SimdKernel;
pub use crate::kernel::{overlap_exceeds, IouScratch, RoundWinner, TileMut};
pub use crate::plan::{
    partition, ArenaLayout, ArenaParts, PlanRequest, Region, ScratchArena, TileSpan, TilingPlan,
    WorkerSlice, ALIGN, BEST_RECORD_LEN, BOX_FIELDS, STAGING_CAPACITY,
};
#[cfg(feature = "rayon")]
pub use crate::kernel::rayon::suppress_par;
