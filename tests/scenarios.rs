use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

use tilenms::{
    decode_interleaved, greedy_nms, nms_detection, CandidateSet, CandidateView, ExecMode,
    MemoryTier, Nms, NmsConfig, ScoredBox,
};

/// One hand-checked case from `tests/data/scenarios.json`.
#[derive(Debug, Deserialize)]
struct Case {
    case_id: String,
    boxes: Vec<[f32; 5]>,
    iou_threshold: f32,
    score_threshold: f32,
    keep: usize,
    /// Indices of the kept boxes, in output order.
    expected: Vec<usize>,
}

#[derive(Debug, Deserialize)]
struct Fixture {
    cases: Vec<Case>,
}

fn load_cases() -> Vec<Case> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/scenarios.json");
    let text = fs::read_to_string(&path).expect("read scenarios fixture");
    let fixture: Fixture = serde_json::from_str(&text).expect("parse scenarios fixture");
    fixture.cases
}

fn to_boxes(raw: &[[f32; 5]]) -> Vec<ScoredBox<f32>> {
    raw.iter()
        .map(|r| ScoredBox::new(r[0], r[1], r[2], r[3], r[4]))
        .collect()
}

fn config_for(case: &Case) -> NmsConfig {
    NmsConfig::default()
        .with_keep(case.keep)
        .with_iou_threshold(case.iou_threshold)
        .with_score_threshold(case.score_threshold)
}

#[test]
fn fixture_cases_match_expected_selection() {
    let cases = load_cases();
    assert!(cases.len() >= 2);
    for case in &cases {
        let boxes = to_boxes(&case.boxes);
        let expected: Vec<_> = case.expected.iter().map(|&i| boxes[i]).collect();
        for workers in [1, 2, 4] {
            let nms = Nms::new(config_for(case).with_workers(workers));
            let mut set = CandidateSet::from_boxes(&boxes);
            let kept = nms.select(&mut set).unwrap();
            assert_eq!(kept, expected, "case {} workers {workers}", case.case_id);
        }
    }
}

#[test]
fn fixture_cases_agree_with_reference() {
    for case in &load_cases() {
        let boxes = to_boxes(&case.boxes);
        let reference: Vec<_> = greedy_nms(&boxes, &config_for(case))
            .into_iter()
            .map(|(idx, _)| idx)
            .collect();
        assert_eq!(reference, case.expected, "case {}", case.case_id);
    }
}

#[test]
fn identical_boxes_keep_only_the_best() {
    let boxes: Vec<_> = [0.9f32, 0.8, 0.7, 0.6, 0.5]
        .iter()
        .map(|&s| ScoredBox::new(s, 0.0, 0.0, 10.0, 10.0))
        .collect();
    let mut set = CandidateSet::from_boxes(&boxes);
    let cfg = NmsConfig::default()
        .with_keep(5)
        .with_iou_threshold(0.5)
        .with_score_threshold(0.1);
    let mut dest = vec![0.0f32; 25];
    let summary = nms_detection(set.as_view_mut(), &mut dest, &cfg).unwrap();
    assert_eq!(summary.kept, 1);
    assert_eq!(&dest[..5], &[0.9, 0.0, 0.0, 10.0, 10.0]);
    assert!(dest[5..].iter().all(|&v| v == 0.0));
    // every candidate was either selected or suppressed
    assert!(set.scores().iter().all(|&s| s == 0.0));
}

#[test]
fn empty_input_writes_nothing() {
    let mut scores: Vec<f32> = Vec::new();
    let coords: Vec<f32> = Vec::new();
    let mut dest = vec![-1.0f32; 10];
    for workers in [1, 4] {
        let cfg = NmsConfig::default().with_workers(workers);
        let summary =
            nms_detection(CandidateView::new(&mut scores, &coords, 0, 0), &mut dest, &cfg).unwrap();
        assert_eq!(summary.kept, 0);
    }
    assert!(dest.iter().all(|&v| v == -1.0));
}

#[test]
fn empty_local_input_leaves_caller_buffers_alone() {
    // a resident-eligible layout with lanes allocated but no candidates
    let stride = 64;
    let mut scores = vec![0.7f32; stride];
    let coords = vec![1.0f32; 4 * stride];
    let mut dest = vec![-1.0f32; 10];
    for workers in [1, 4] {
        let cfg = NmsConfig::default()
            .with_workers(workers)
            .with_tiers(MemoryTier::Local, MemoryTier::Local);
        let view = CandidateView::new(&mut scores, &coords, 0, stride);
        let summary = nms_detection(view, &mut dest, &cfg).unwrap();
        assert_eq!(summary.kept, 0);
    }
    assert!(scores.iter().all(|&s| s == 0.7));
    assert!(dest.iter().all(|&v| v == -1.0));
}

#[test]
fn padded_local_set_runs_resident() {
    let boxes: Vec<_> = (0..10)
        .map(|i| {
            let x = (i / 2) as f32 * 10.0;
            ScoredBox::new(0.9 - i as f32 * 0.05, x, 0.0, x + 4.0, 4.0)
        })
        .collect();
    let cfg = NmsConfig::default().with_tiers(MemoryTier::Local, MemoryTier::Main);

    let mut padded = CandidateSet::from_boxes_padded(&boxes);
    let view = padded.as_padded_view_mut();
    assert_eq!(view.count, 64);
    let mut dest = vec![0.0f32; 5 * 64];
    let summary = nms_detection(view, &mut dest, &cfg).unwrap();
    assert_eq!(summary.mode, ExecMode::Resident);

    let expected = Nms::new(cfg)
        .select(&mut CandidateSet::from_boxes(&boxes))
        .unwrap();
    assert_eq!(expected.len(), 5);
    assert_eq!(decode_interleaved(&dest, summary.kept), expected);
}

#[test]
fn zero_keep_budget_keeps_nothing() {
    let boxes = [ScoredBox::new(0.9f32, 0.0, 0.0, 1.0, 1.0); 3];
    let mut set = CandidateSet::from_boxes(&boxes);
    let mut dest: Vec<f32> = Vec::new();
    let cfg = NmsConfig::default().with_keep(0);
    let summary = nms_detection(set.as_view_mut(), &mut dest, &cfg).unwrap();
    assert_eq!(summary.kept, 0);
    assert_eq!(set.scores(), &[0.9, 0.9, 0.9]);
}

#[test]
fn score_threshold_above_max_keeps_nothing() {
    let boxes = [
        ScoredBox::new(0.9f32, 0.0, 0.0, 1.0, 1.0),
        ScoredBox::new(0.4f32, 5.0, 5.0, 6.0, 6.0),
    ];
    let mut set = CandidateSet::from_boxes(&boxes);
    let mut dest = vec![-1.0f32; 10];
    let cfg = NmsConfig::default().with_score_threshold(0.9);
    let summary = nms_detection(set.as_view_mut(), &mut dest, &cfg).unwrap();
    assert_eq!(summary.kept, 0);
    assert!(dest.iter().all(|&v| v == -1.0));
    // the terminating round still consumed its winner
    assert_eq!(set.scores(), &[0.0, 0.4]);
}

#[test]
fn workers_outnumbering_candidates() {
    let boxes = [
        ScoredBox::new(0.3f32, 0.0, 0.0, 2.0, 2.0),
        ScoredBox::new(0.7f32, 10.0, 0.0, 12.0, 2.0),
    ];
    let mut set = CandidateSet::from_boxes(&boxes);
    let mut dest = vec![0.0f32; 10];
    let cfg = NmsConfig::default().with_workers(4);
    let summary = nms_detection(set.as_view_mut(), &mut dest, &cfg).unwrap();
    assert_eq!(summary.kept, 2);
    assert_eq!(decode_interleaved(&dest, 2), vec![boxes[1], boxes[0]]);
}

#[test]
fn long_runs_flush_staging_more_than_once() {
    // 600 disjoint boxes force two full staging flushes plus a final one
    let n = 600;
    let boxes: Vec<_> = (0..n)
        .map(|i| {
            let x = 4.0 * i as f32;
            ScoredBox::new(1.0 - i as f32 / 1000.0, x, 0.0, x + 2.0, 2.0)
        })
        .collect();
    let mut set = CandidateSet::from_boxes(&boxes);
    let cfg = NmsConfig::default().with_keep(n).with_workers(4);
    let mut dest = vec![0.0f32; 5 * n];
    let summary = nms_detection(set.as_view_mut(), &mut dest, &cfg).unwrap();
    assert_eq!(summary.kept, n);
    assert_eq!(decode_interleaved(&dest, n), boxes);
}
