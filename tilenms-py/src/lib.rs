//! Python bindings for the tilenms non-maximum suppression library.
//!
//! Boxes come in as `(N, 4)` float32 arrays of `x1, y1, x2, y2` rows with a
//! matching `(N,)` score array; kept boxes come back as a `(K, 5)` array of
//! `score, x1, y1, x2, y2` rows, highest score first.

use numpy::ndarray::Array2;
use numpy::{IntoPyArray, PyArray2, PyReadonlyArray1, PyReadonlyArray2, PyUntypedArrayMethods};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use tilenms::{
    decode_interleaved, nms_detection, CandidateSet, MemoryTier, Nms as RustNms,
    NmsConfig as RustNmsConfig, NmsError, OutputLayout, ScoredBox,
};

/// Convert an NmsError to a Python exception.
fn to_py_err(err: NmsError) -> PyErr {
    PyRuntimeError::new_err(err.to_string())
}

fn parse_tier(name: &str) -> PyResult<MemoryTier> {
    match name.to_lowercase().as_str() {
        "main" => Ok(MemoryTier::Main),
        "shared" => Ok(MemoryTier::Shared),
        "local" => Ok(MemoryTier::Local),
        _ => Err(PyValueError::new_err(
            "tier must be 'main', 'shared' or 'local'",
        )),
    }
}

/// Configuration for an NMS invocation.
#[pyclass]
#[derive(Clone)]
pub struct NmsConfig {
    inner: RustNmsConfig,
}

#[pymethods]
impl NmsConfig {
    /// Create a new NmsConfig.
    ///
    /// Args:
    ///     workers: Workers sharing the candidates (default: 1)
    ///     keep: Maximum number of kept boxes (default: 100)
    ///     iou_threshold: Suppression IoU threshold in [0, 1] (default: 0.45)
    ///     score_threshold: Scores at or below this stop the loop (default: 0.0)
    ///     scratch_bytes: Per-worker scratch capacity (default: 524288)
    ///     source: "main", "shared" or "local" (default: "main")
    ///     destination: "main", "shared" or "local" (default: "main")
    ///     parallel: Enable the rayon sweep for resident slices (default: False)
    #[new]
    #[pyo3(signature = (
        workers = 1,
        keep = 100,
        iou_threshold = 0.45,
        score_threshold = 0.0,
        scratch_bytes = 512 * 1024,
        source = "main",
        destination = "main",
        parallel = false
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        workers: usize,
        keep: usize,
        iou_threshold: f32,
        score_threshold: f32,
        scratch_bytes: usize,
        source: &str,
        destination: &str,
        parallel: bool,
    ) -> PyResult<Self> {
        let inner = RustNmsConfig {
            workers,
            keep,
            iou_threshold,
            score_threshold,
            scratch_bytes,
            source: parse_tier(source)?,
            destination: parse_tier(destination)?,
            parallel,
            ..RustNmsConfig::default()
        };
        inner.validate().map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Validate the configuration.
    fn validate(&self) -> PyResult<()> {
        self.inner.validate().map_err(to_py_err)
    }

    fn __repr__(&self) -> String {
        format!(
            "NmsConfig(workers={}, keep={}, iou_threshold={}, score_threshold={}, parallel={})",
            self.inner.workers,
            self.inner.keep,
            self.inner.iou_threshold,
            self.inner.score_threshold,
            self.inner.parallel
        )
    }
}

fn collect_boxes(
    boxes: &PyReadonlyArray2<'_, f32>,
    scores: &PyReadonlyArray1<'_, f32>,
) -> PyResult<Vec<ScoredBox<f32>>> {
    let shape = boxes.shape();
    if shape[1] != 4 {
        return Err(PyValueError::new_err("boxes must have shape (N, 4)"));
    }
    let n = shape[0];
    if scores.shape()[0] != n {
        return Err(PyValueError::new_err("scores must have shape (N,)"));
    }
    let coords = boxes.as_slice()?;
    let scores = scores.as_slice()?;
    Ok(coords
        .chunks_exact(4)
        .zip(scores)
        .map(|(c, &s)| ScoredBox::new(s, c[0], c[1], c[2], c[3]))
        .collect())
}

fn run_nms<'py>(
    py: Python<'py>,
    boxes: PyReadonlyArray2<'py, f32>,
    scores: PyReadonlyArray1<'py, f32>,
    config: RustNmsConfig,
) -> PyResult<Bound<'py, PyArray2<f32>>> {
    let candidates = collect_boxes(&boxes, &scores)?;
    let kept = if config.source == MemoryTier::Local {
        let mut set = CandidateSet::from_boxes_padded(&candidates);
        let view = set.as_padded_view_mut();
        let config = config.with_layout(OutputLayout::Interleaved);
        let needed = config
            .layout
            .required_len(config.keep.min(view.count), view.count);
        let mut dest = vec![0.0f32; needed];
        let summary = nms_detection(view, &mut dest, &config).map_err(to_py_err)?;
        decode_interleaved(&dest, summary.kept)
    } else {
        RustNms::new(config)
            .select(&mut CandidateSet::from_boxes(&candidates))
            .map_err(to_py_err)?
    };

    let rows = kept.len();
    let flat: Vec<f32> = kept.iter().flat_map(|b| b.to_array()).collect();
    let array = Array2::from_shape_vec((rows, 5), flat)
        .map_err(|err| PyRuntimeError::new_err(err.to_string()))?;
    Ok(array.into_pyarray(py))
}

/// Greedy non-maximum suppression.
///
/// Args:
///     boxes: (N, 4) float32 array of x1, y1, x2, y2 rows
///     scores: (N,) float32 array
///     iou_threshold: Suppression IoU threshold (default: 0.45)
///     score_threshold: Scores at or below this stop the loop (default: 0.0)
///     keep: Maximum number of kept boxes (default: 100)
///     workers: Workers sharing the candidates (default: 1)
///
/// Returns:
///     (K, 5) float32 array of score, x1, y1, x2, y2 rows
#[pyfunction]
#[pyo3(signature = (boxes, scores, iou_threshold = 0.45, score_threshold = 0.0, keep = 100, workers = 1))]
fn nms<'py>(
    py: Python<'py>,
    boxes: PyReadonlyArray2<'py, f32>,
    scores: PyReadonlyArray1<'py, f32>,
    iou_threshold: f32,
    score_threshold: f32,
    keep: usize,
    workers: usize,
) -> PyResult<Bound<'py, PyArray2<f32>>> {
    let config = RustNmsConfig::default()
        .with_iou_threshold(iou_threshold)
        .with_score_threshold(score_threshold)
        .with_keep(keep)
        .with_workers(workers);
    run_nms(py, boxes, scores, config)
}

/// Greedy non-maximum suppression with a full NmsConfig.
#[pyfunction]
fn nms_with_config<'py>(
    py: Python<'py>,
    boxes: PyReadonlyArray2<'py, f32>,
    scores: PyReadonlyArray1<'py, f32>,
    config: NmsConfig,
) -> PyResult<Bound<'py, PyArray2<f32>>> {
    run_nms(py, boxes, scores, config.inner)
}

/// Python module for tilenms.
#[pymodule]
fn _tilenms(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<NmsConfig>()?;
    m.add_function(wrap_pyfunction!(nms, m)?)?;
    m.add_function(wrap_pyfunction!(nms_with_config, m)?)?;

    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}
