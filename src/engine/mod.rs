//! Greedy non-maximum suppression over a worker group.
//!
//! [`nms_detection`] is the entry point: it checks the parameter and memory
//! contract, plans the tiling, splits the score array into one disjoint
//! slice per worker and runs the round loop on a scoped thread group. Once
//! admitted, an invocation fails only if a kernel panics; the group is then
//! released and the panic is reported as [`NmsError::WorkerPanicked`].

use std::panic::{self, AssertUnwindSafe};
use std::thread;

use crate::geometry::{CandidateSet, CandidateView, CoordLanes, ScoredBox};
use crate::kernel::{Element, Kernel};
use crate::plan::{ExecMode, MemoryTier, PlanRequest, TilingPlan, STAGING_CAPACITY};
use crate::trace::{trace_event, trace_span};
use crate::util::{NmsError, NmsResult};

pub mod output;
pub(crate) mod reduce;
pub(crate) mod worker;

pub use output::{decode_interleaved, decode_planar, decode_sparse, OutputLayout};

use output::OutputCompactor;
use reduce::{GroupAborted, RoundExchange};
use worker::{RoundParams, Worker};

/// Worker count of one hardware cluster.
pub const WORKERS_CLUSTER: usize = 4;

/// Parameters of one NMS invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct NmsConfig {
    /// Workers sharing the candidate set.
    pub workers: usize,
    /// Maximum number of boxes to keep.
    pub keep: usize,
    /// IoU above which a candidate is suppressed, in `[0, 1]`.
    pub iou_threshold: f32,
    /// Scores at or below this value end the loop.
    pub score_threshold: f32,
    /// Destination layout.
    pub layout: OutputLayout,
    /// Per-worker scratch capacity in bytes.
    pub scratch_bytes: usize,
    /// Tier the candidate arrays live in.
    pub source: MemoryTier,
    /// Tier the destination lives in.
    pub destination: MemoryTier,
    /// Sweep resident slices on the rayon pool. Rejected by [`validate`]
    /// unless the `rayon` feature is enabled.
    ///
    /// [`validate`]: NmsConfig::validate
    pub parallel: bool,
}

impl Default for NmsConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            keep: 100,
            iou_threshold: 0.45,
            score_threshold: 0.0,
            layout: OutputLayout::Interleaved,
            scratch_bytes: 512 * 1024,
            source: MemoryTier::Main,
            destination: MemoryTier::Main,
            parallel: false,
        }
    }
}

impl NmsConfig {
    /// Checks the parameters that do not depend on the buffers.
    pub fn validate(&self) -> NmsResult<()> {
        if self.workers == 0 {
            return Err(NmsError::InvalidWorkerCount { workers: 0 });
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(NmsError::InvalidThreshold {
                name: "iou",
                value: self.iou_threshold,
            });
        }
        if self.score_threshold.is_nan() {
            return Err(NmsError::InvalidThreshold {
                name: "score",
                value: self.score_threshold,
            });
        }
        if self.parallel && !cfg!(feature = "rayon") {
            return Err(NmsError::InvalidInput(
                "parallel sweep requires the rayon feature",
            ));
        }
        Ok(())
    }

    /// Sets the worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the keep budget.
    pub fn with_keep(mut self, keep: usize) -> Self {
        self.keep = keep;
        self
    }

    /// Sets the IoU threshold.
    pub fn with_iou_threshold(mut self, iou_threshold: f32) -> Self {
        self.iou_threshold = iou_threshold;
        self
    }

    /// Sets the score threshold.
    pub fn with_score_threshold(mut self, score_threshold: f32) -> Self {
        self.score_threshold = score_threshold;
        self
    }

    /// Sets the destination layout.
    pub fn with_layout(mut self, layout: OutputLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Sets the per-worker scratch capacity.
    pub fn with_scratch_bytes(mut self, scratch_bytes: usize) -> Self {
        self.scratch_bytes = scratch_bytes;
        self
    }

    /// Sets the source and destination tiers.
    pub fn with_tiers(mut self, source: MemoryTier, destination: MemoryTier) -> Self {
        self.source = source;
        self.destination = destination;
        self
    }

    /// Enables the rayon sweep for resident slices.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Staging capacity the compactor uses for this configuration.
    fn staging_boxes(&self) -> usize {
        match (self.destination, self.layout) {
            (_, OutputLayout::SparseOverwrite) | (MemoryTier::Local, _) => 0,
            _ => STAGING_CAPACITY,
        }
    }
}

/// What an invocation did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NmsSummary {
    /// Boxes written to the destination.
    pub kept: usize,
    /// Execution mode the planner selected.
    pub mode: ExecMode,
    /// Tile length used by every worker.
    pub tile_len: usize,
}

/// Runs greedy NMS with the default kernel of `T`.
///
/// Scores of selected and suppressed candidates are zeroed in place. The
/// kept boxes are written to `dest` in `config.layout`, highest score first;
/// the rest of `dest` is left untouched.
pub fn nms_detection<T: Element>(
    candidates: CandidateView<'_, T>,
    dest: &mut [T],
    config: &NmsConfig,
) -> NmsResult<NmsSummary> {
    nms_detection_with::<T, T::Kernel>(candidates, dest, config)
}

/// Runs greedy NMS with an explicit kernel.
pub fn nms_detection_with<T: Element, K: Kernel<T>>(
    candidates: CandidateView<'_, T>,
    dest: &mut [T],
    config: &NmsConfig,
) -> NmsResult<NmsSummary> {
    config.validate()?;
    let CandidateView {
        scores,
        coords,
        count,
        stride,
    } = candidates;
    if scores.len() < count {
        return Err(NmsError::BufferTooSmall {
            what: "score",
            needed: count,
            got: scores.len(),
        });
    }
    let lanes = CoordLanes::new(coords, count, stride)?;

    let budget = config.keep.min(count);
    if let OutputLayout::Planar { stride: lane_stride } = config.layout {
        if budget > 0 && lane_stride < budget {
            return Err(NmsError::InvalidStride {
                count: budget,
                stride: lane_stride,
            });
        }
    }
    let needed = config.layout.required_len(budget, count);
    if dest.len() < needed {
        return Err(NmsError::BufferTooSmall {
            what: "destination",
            needed,
            got: dest.len(),
        });
    }

    let staging_boxes = config.staging_boxes();
    let plan = TilingPlan::new::<T>(PlanRequest {
        count,
        workers: config.workers,
        scratch_bytes: config.scratch_bytes,
        source: config.source,
        staging_boxes,
    })?;

    let _span = trace_span!("nms_detection", n = count, workers = config.workers).entered();
    let first = plan.slices()[0];
    trace_event!(
        "tiling_plan",
        elem = T::NAME,
        mode = plan.mode().as_str(),
        tile_len = plan.tile_len(),
        repeat = plan.repeat(first),
        remain = plan.remain(first),
        layout = config.layout.as_str(),
    );

    if plan.mode() == ExecMode::Resident && count > 0 {
        let end = stride.min(scores.len());
        scores[count..end].iter_mut().for_each(|s| *s = T::zero());
    }

    let params = RoundParams {
        keep: config.keep,
        thresh_iou: T::from_f32(config.iou_threshold),
        thresh_score: T::from_f32(config.score_threshold),
    };

    let designated = config.workers - 1;
    let mut rest = &mut scores[..count];
    let mut dest = Some(dest);
    let mut workers = Vec::with_capacity(config.workers);
    for (id, slice) in plan.slices().iter().enumerate() {
        let (mine, tail) = std::mem::take(&mut rest).split_at_mut(slice.len);
        rest = tail;
        let output = if id == designated {
            dest.take()
                .map(|d| OutputCompactor::new(d, config.layout, staging_boxes))
        } else {
            None
        };
        workers.push(Worker::new(
            id,
            &plan,
            mine,
            lanes.slice(slice.start, slice.len),
            output,
            config.parallel,
        ));
    }

    let kept = run_group::<T, K>(workers, &params)?;
    trace_event!("nms_kept", kept = kept);
    Ok(NmsSummary {
        kept,
        mode: plan.mode(),
        tile_len: plan.tile_len(),
    })
}

/// How one member of the group finished.
enum MemberExit {
    Done(usize),
    Aborted,
    Panicked,
}

/// Runs one worker, aborting the group if its kernel panics.
fn run_member<T: Element, K: Kernel<T>>(
    worker: Worker<'_, T>,
    exchange: &RoundExchange<T>,
    params: &RoundParams<T>,
) -> MemberExit {
    match panic::catch_unwind(AssertUnwindSafe(|| worker.run::<K>(exchange, params))) {
        Ok(Ok(kept)) => MemberExit::Done(kept),
        Ok(Err(GroupAborted)) => MemberExit::Aborted,
        Err(_) => {
            exchange.abort();
            MemberExit::Panicked
        }
    }
}

/// Runs every worker to completion and returns the designated worker's
/// output count.
fn run_group<T: Element, K: Kernel<T>>(
    workers: Vec<Worker<'_, T>>,
    params: &RoundParams<T>,
) -> NmsResult<usize> {
    let exchange = RoundExchange::new(workers.len());
    let exits: Vec<MemberExit> = if workers.len() == 1 {
        workers
            .into_iter()
            .map(|worker| run_member::<T, K>(worker, &exchange, params))
            .collect()
    } else {
        thread::scope(|scope| {
            let handles: Vec<_> = workers
                .into_iter()
                .map(|worker| {
                    let exchange = &exchange;
                    scope.spawn(move || run_member::<T, K>(worker, exchange, params))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or(MemberExit::Panicked))
                .collect()
        })
    };

    if let Some(worker) = exits
        .iter()
        .position(|exit| matches!(exit, MemberExit::Panicked))
    {
        return Err(NmsError::WorkerPanicked { worker });
    }
    let designated = exits.len() - 1;
    match exits[designated] {
        MemberExit::Done(kept) => Ok(kept),
        _ => Err(NmsError::WorkerPanicked { worker: designated }),
    }
}

/// Convenience front end owning its configuration.
#[derive(Clone, Debug, Default)]
pub struct Nms {
    config: NmsConfig,
}

impl Nms {
    /// Creates a runner for `config`.
    pub fn new(config: NmsConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &NmsConfig {
        &self.config
    }

    /// Runs on caller-provided buffers.
    pub fn run<T: Element>(
        &self,
        candidates: CandidateView<'_, T>,
        dest: &mut [T],
    ) -> NmsResult<NmsSummary> {
        nms_detection(candidates, dest, &self.config)
    }

    /// Runs on an owned set and returns the kept boxes in rank order.
    ///
    /// The configured layout is ignored; results are collected through an
    /// interleaved buffer. The set's scores are consumed in place.
    pub fn select<T: Element>(&self, set: &mut CandidateSet<T>) -> NmsResult<Vec<ScoredBox<T>>> {
        let config = self.config.clone().with_layout(OutputLayout::Interleaved);
        let budget = config.keep.min(set.len());
        let mut dest = vec![T::zero(); config.layout.required_len(budget, set.len())];
        let summary = nms_detection(set.as_view_mut(), &mut dest, &config)?;
        Ok(decode_interleaved(&dest, summary.kept))
    }
}
