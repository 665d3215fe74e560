//! TileNMS is a tiled, multi-worker greedy non-maximum suppression library.
//!
//! Candidates live in parallel score/coordinate arrays. A planner sizes
//! aligned tiles to a fixed per-worker scratch capacity, a group of workers
//! each own a contiguous slice of the candidates, and every round the global
//! maximum is selected across workers before all overlapping candidates are
//! suppressed. Optional features add a SIMD kernel (`simd`), data-parallel
//! sweeps and batches (`rayon`), 16-bit floats (`f16`) and `tracing` spans.

pub mod batch;
pub mod engine;
pub mod geometry;
pub mod kernel;
pub mod lowlevel;
pub mod plan;
pub mod reference;
mod trace;
pub mod util;

pub use batch::nms_batch;
pub use engine::{
    decode_interleaved, decode_planar, decode_sparse, nms_detection, nms_detection_with, Nms,
    NmsConfig, NmsSummary, OutputLayout, WORKERS_CLUSTER,
};
pub use geometry::{iou, CandidateSet, CandidateView, ScoredBox};
pub use kernel::{Element, Kernel};
pub use plan::{ExecMode, MemoryTier};
pub use reference::greedy_nms;
pub use util::{NmsError, NmsResult};
