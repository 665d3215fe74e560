//! Error types for tilenms.

use thiserror::Error;

/// Result alias for tilenms operations.
pub type NmsResult<T> = std::result::Result<T, NmsError>;

/// Errors reported when an invocation violates the parameter/memory contract.
///
/// Apart from [`NmsError::WorkerPanicked`], every variant is raised by the
/// up-front validation performed before any candidate is touched.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum NmsError {
    /// The worker group must contain at least one worker.
    #[error("invalid worker count {workers}: at least one worker is required")]
    InvalidWorkerCount { workers: usize },
    /// Coordinate lanes must be at least `count` elements apart.
    #[error("invalid coordinate stride {stride} for {count} candidates")]
    InvalidStride { count: usize, stride: usize },
    /// A caller-provided buffer is shorter than the contract requires.
    #[error("{what} buffer too small: needed {needed}, got {got}")]
    BufferTooSmall {
        what: &'static str,
        needed: usize,
        got: usize,
    },
    /// Scratch capacity cannot hold a single aligned tile.
    #[error("scratch capacity too small: needed at least {needed} bytes, got {got}")]
    ScratchTooSmall { needed: usize, got: usize },
    /// A threshold is NaN or outside its admissible range.
    #[error("invalid {name} threshold: {value}")]
    InvalidThreshold { name: &'static str, value: f32 },
    /// A worker thread panicked before finishing its rounds.
    #[error("worker {worker} panicked")]
    WorkerPanicked { worker: usize },
    /// A parameter combination the build cannot honour.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
}
