use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tilenms::{
    decode_interleaved, decode_planar, decode_sparse, nms_detection, CandidateSet, MemoryTier,
    NmsConfig, OutputLayout, ScoredBox,
};
use tracing_subscriber::EnvFilter;

const SCHEMA_JSON: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.schema.json"));
const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "TileNMS CLI (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print the JSON schema and exit.
    #[arg(long)]
    print_schema: bool,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output for performance profiling.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum LayoutConfig {
    #[default]
    Interleaved,
    Planar,
    Sparse,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TierConfig {
    #[default]
    Main,
    Shared,
    Local,
}

impl From<TierConfig> for MemoryTier {
    fn from(value: TierConfig) -> Self {
        match value {
            TierConfig::Main => MemoryTier::Main,
            TierConfig::Shared => MemoryTier::Shared,
            TierConfig::Local => MemoryTier::Local,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct NmsConfigJson {
    workers: usize,
    keep: usize,
    iou_threshold: f32,
    score_threshold: f32,
    layout: LayoutConfig,
    /// Lane stride for the planar layout; defaults to the keep budget.
    planar_stride: Option<usize>,
    scratch_bytes: usize,
    source: TierConfig,
    destination: TierConfig,
    parallel: bool,
}

impl Default for NmsConfigJson {
    fn default() -> Self {
        let cfg = NmsConfig::default();
        Self {
            workers: cfg.workers,
            keep: cfg.keep,
            iou_threshold: cfg.iou_threshold,
            score_threshold: cfg.score_threshold,
            layout: LayoutConfig::Interleaved,
            planar_stride: None,
            scratch_bytes: cfg.scratch_bytes,
            source: TierConfig::Main,
            destination: TierConfig::Main,
            parallel: cfg.parallel,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Config {
    input_path: String,
    output_path: Option<String>,
    nms: NmsConfigJson,
}

/// Candidate file: one `[score, x1, y1, x2, y2]` row per box.
#[derive(Debug, Deserialize)]
struct Input {
    boxes: Vec<[f32; 5]>,
}

#[derive(Debug, Serialize)]
struct BoxRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    index: Option<usize>,
    score: f32,
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

impl From<ScoredBox<f32>> for BoxRecord {
    fn from(value: ScoredBox<f32>) -> Self {
        Self {
            index: None,
            score: value.score,
            x1: value.x1,
            y1: value.y1,
            x2: value.x2,
            y2: value.y2,
        }
    }
}

#[derive(Debug, Serialize)]
struct Output {
    kept: usize,
    mode: &'static str,
    tile_len: usize,
    boxes: Vec<BoxRecord>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env().add_directive("tilenms=info".parse()?))
            .with_target(false)
            .init();
    }

    if cli.print_schema {
        println!("{SCHEMA_JSON}");
        return Ok(());
    }
    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.input_path.is_empty() {
        return Err("input_path must be set in the config".into());
    }

    let input_text = fs::read_to_string(&config.input_path)?;
    let input: Input = serde_json::from_str(&input_text)?;
    let boxes: Vec<ScoredBox<f32>> = input
        .boxes
        .iter()
        .map(|r| ScoredBox::new(r[0], r[1], r[2], r[3], r[4]))
        .collect();
    tracing::info!(candidates = boxes.len(), path = %config.input_path, "loaded candidates");

    let json_cfg = config.nms;
    let source: MemoryTier = json_cfg.source.into();
    let mut set = if source == MemoryTier::Local {
        CandidateSet::from_boxes_padded(&boxes)
    } else {
        CandidateSet::from_boxes(&boxes)
    };
    let view = if source == MemoryTier::Local {
        set.as_padded_view_mut()
    } else {
        set.as_view_mut()
    };

    let n = view.count;
    let budget = json_cfg.keep.min(n);
    let layout = match json_cfg.layout {
        LayoutConfig::Interleaved => OutputLayout::Interleaved,
        LayoutConfig::Planar => OutputLayout::Planar {
            stride: json_cfg.planar_stride.unwrap_or(budget),
        },
        LayoutConfig::Sparse => OutputLayout::SparseOverwrite,
    };
    let nms_cfg = NmsConfig {
        workers: json_cfg.workers,
        keep: json_cfg.keep,
        iou_threshold: json_cfg.iou_threshold,
        score_threshold: json_cfg.score_threshold,
        layout,
        scratch_bytes: json_cfg.scratch_bytes,
        source,
        destination: json_cfg.destination.into(),
        parallel: json_cfg.parallel,
    };

    let mut dest = vec![0.0f32; layout.required_len(budget, n)];
    let summary = nms_detection(view, &mut dest, &nms_cfg)?;
    tracing::info!(kept = summary.kept, mode = summary.mode.as_str(), "nms finished");

    let records: Vec<BoxRecord> = match layout {
        OutputLayout::Interleaved => decode_interleaved(&dest, summary.kept)
            .into_iter()
            .map(BoxRecord::from)
            .collect(),
        OutputLayout::Planar { stride } => decode_planar(&dest, stride, summary.kept)
            .into_iter()
            .map(BoxRecord::from)
            .collect(),
        OutputLayout::SparseOverwrite => decode_sparse(&dest)
            .into_iter()
            .map(|(index, score)| BoxRecord {
                index: Some(index),
                score,
                ..BoxRecord::from(boxes[index])
            })
            .collect(),
    };

    let output = Output {
        kept: summary.kept,
        mode: summary.mode.as_str(),
        tile_len: summary.tile_len,
        boxes: records,
    };
    let json = serde_json::to_string_pretty(&output)?;

    match config.output_path {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }

    Ok(())
}
