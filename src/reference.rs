//! Sort-based sequential greedy NMS.
//!
//! Visits candidates in descending score order (lowest index first on ties)
//! and applies the same survival test and thresholds as the tiled engine, so
//! both produce the same boxes in the same order. Used for parity checks and
//! as a benchmark baseline.

use std::cmp::Ordering;

use crate::engine::NmsConfig;
use crate::geometry::ScoredBox;
use crate::kernel::{overlap_exceeds, Element, RoundWinner};

fn rank_cmp_desc<T: Element>(a: &(usize, ScoredBox<T>), b: &(usize, ScoredBox<T>)) -> Ordering {
    b.1.score
        .as_f32()
        .total_cmp(&a.1.score.as_f32())
        .then_with(|| a.0.cmp(&b.0))
}

/// Returns `(index, box)` for every kept candidate, highest score first.
///
/// Scores at or below zero are treated as already removed, and NaN scores
/// are never selected.
pub fn greedy_nms<T: Element>(
    boxes: &[ScoredBox<T>],
    config: &NmsConfig,
) -> Vec<(usize, ScoredBox<T>)> {
    let thresh_iou = T::from_f32(config.iou_threshold);
    let thresh_score = T::from_f32(config.score_threshold);

    let mut order: Vec<(usize, ScoredBox<T>)> = boxes
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, b)| b.score > T::zero())
        .collect();
    order.sort_by(rank_cmp_desc);

    let mut removed = vec![false; order.len()];
    let mut kept = Vec::new();
    for rank in 0..order.len() {
        if kept.len() == config.keep {
            break;
        }
        if removed[rank] {
            continue;
        }
        let (index, candidate) = order[rank];
        if candidate.score <= thresh_score {
            break;
        }
        kept.push((index, candidate));

        let winner = RoundWinner::new(
            candidate.score,
            [candidate.x1, candidate.y1, candidate.x2, candidate.y2],
            index,
        );
        for later in rank + 1..order.len() {
            let b = &order[later].1;
            if !removed[later] && overlap_exceeds(&winner, [b.x1, b.y1, b.x2, b.y2], thresh_iou) {
                removed[later] = true;
            }
        }
    }
    kept
}
