use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tilenms::lowlevel::{overlap_exceeds, RoundWinner};
use tilenms::{greedy_nms, iou, CandidateSet, MemoryTier, Nms, NmsConfig, ScoredBox};

/// Clustered random boxes with coarse scores, so ties and heavy overlaps are
/// common.
fn random_boxes(rng: &mut StdRng, n: usize) -> Vec<ScoredBox<f32>> {
    let centers: Vec<(f32, f32)> = (0..8)
        .map(|_| (rng.random_range(0.0..200.0), rng.random_range(0.0..200.0)))
        .collect();
    (0..n)
        .map(|_| {
            let (cx, cy) = centers[rng.random_range(0..centers.len())];
            let x1 = (cx + rng.random_range(-12.0f32..12.0)).round();
            let y1 = (cy + rng.random_range(-12.0f32..12.0)).round();
            let w = rng.random_range(4..30) as f32;
            let h = rng.random_range(4..30) as f32;
            let score = rng.random_range(1..=40) as f32 / 40.0;
            ScoredBox::new(score, x1, y1, x1 + w, y1 + h)
        })
        .collect()
}

fn run(boxes: &[ScoredBox<f32>], cfg: NmsConfig) -> Vec<ScoredBox<f32>> {
    let mut set = CandidateSet::from_boxes(boxes);
    Nms::new(cfg).select(&mut set).unwrap()
}

fn base_config() -> NmsConfig {
    NmsConfig::default()
        .with_keep(64)
        .with_iou_threshold(0.4)
        .with_score_threshold(0.1)
}

#[test]
fn kept_boxes_respect_budget_thresholds_and_order() {
    let mut rng = StdRng::seed_from_u64(7);
    for trial in 0..20 {
        let n = rng.random_range(1..400);
        let boxes = random_boxes(&mut rng, n);
        let cfg = base_config().with_keep(rng.random_range(0..40));
        let kept = run(&boxes, cfg.clone());

        assert!(kept.len() <= cfg.keep, "trial {trial}");
        assert!(kept.iter().all(|b| b.score > cfg.score_threshold));
        assert!(kept.windows(2).all(|w| w[0].score >= w[1].score));

        for (i, a) in kept.iter().enumerate() {
            let winner = RoundWinner::new(a.score, [a.x1, a.y1, a.x2, a.y2], i);
            for b in &kept[i + 1..] {
                assert!(!overlap_exceeds(&winner, [b.x1, b.y1, b.x2, b.y2], 0.4f32));
                assert!(iou(a, b) <= 0.4 + 1e-5);
            }
        }
    }
}

#[test]
fn output_is_a_fixed_point() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..10 {
        let boxes = random_boxes(&mut rng, 300);
        let kept = run(&boxes, base_config());
        let again = run(&kept, base_config());
        assert_eq!(kept, again);
    }
}

#[test]
fn worker_count_does_not_change_selection() {
    let mut rng = StdRng::seed_from_u64(23);
    for _ in 0..10 {
        let n = rng.random_range(1..500);
        let boxes = random_boxes(&mut rng, n);
        let single = run(&boxes, base_config());
        for workers in [2, 3, 4] {
            assert_eq!(single, run(&boxes, base_config().with_workers(workers)));
        }
        let reference: Vec<_> = greedy_nms(&boxes, &base_config())
            .into_iter()
            .map(|(_, b)| b)
            .collect();
        assert_eq!(single, reference);
    }
}

#[test]
fn tile_size_and_fast_path_do_not_change_selection() {
    let mut rng = StdRng::seed_from_u64(31);
    for _ in 0..5 {
        let boxes = random_boxes(&mut rng, 512);
        let expected = run(&boxes, base_config().with_workers(4));

        // two tiles per pass: (5184 - 64 - 1280) / 9 = 426 -> 384
        let small = base_config().with_scratch_bytes(5184 * 4);
        assert_eq!(expected, run(&boxes, small));

        let resident = base_config()
            .with_workers(4)
            .with_tiers(MemoryTier::Local, MemoryTier::Local);
        assert_eq!(expected, run(&boxes, resident));
    }
}
