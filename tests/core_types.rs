use tilenms::lowlevel::{partition, PlanRequest, TilingPlan};
use tilenms::{
    iou, nms_detection, CandidateSet, CandidateView, MemoryTier, NmsConfig, NmsError,
    OutputLayout, ScoredBox,
};

fn unit_boxes(n: usize) -> Vec<ScoredBox<f32>> {
    (0..n)
        .map(|i| {
            let x = 3.0 * i as f32;
            ScoredBox::new(0.5, x, 0.0, x + 1.0, 1.0)
        })
        .collect()
}

#[test]
fn candidate_set_from_parts_checks_lengths() {
    let err = CandidateSet::<f32>::from_parts(vec![0.0; 2], vec![0.0; 12], 3, 3).unwrap_err();
    assert_eq!(
        err,
        NmsError::BufferTooSmall {
            what: "score",
            needed: 3,
            got: 2,
        }
    );

    let err = CandidateSet::<f32>::from_parts(vec![0.0; 3], vec![0.0; 12], 3, 2).unwrap_err();
    assert_eq!(err, NmsError::InvalidStride { count: 3, stride: 2 });

    let set = CandidateSet::<f32>::from_parts(vec![0.0; 4], vec![0.0; 15], 3, 4).unwrap();
    assert_eq!(set.len(), 3);
    assert_eq!(set.stride(), 4);
}

#[test]
fn scored_box_area_and_iou() {
    let a = ScoredBox::new(0.9f32, 0.0, 0.0, 4.0, 2.0);
    let b = ScoredBox::new(0.1f32, 2.0, 0.0, 6.0, 2.0);
    assert_eq!(a.area(), 8.0);
    assert!((iou(&a, &b) - 4.0 / 12.0).abs() < 1e-6);

    let degenerate = ScoredBox::new(0.5f32, 1.0, 1.0, 1.0, 1.0);
    assert_eq!(iou(&degenerate, &degenerate), 0.0);
}

#[test]
fn invocation_rejects_short_buffers() {
    let mut set = CandidateSet::from_boxes(&unit_boxes(4));
    let cfg = NmsConfig::default();

    let (scores, coords) = (set.scores().to_vec(), set.coords().to_vec());
    let mut short_scores = scores[..3].to_vec();
    let mut dest = vec![0.0f32; 20];
    let err = nms_detection(
        CandidateView::new(&mut short_scores, &coords, 4, 4),
        &mut dest,
        &cfg,
    )
    .unwrap_err();
    assert_eq!(
        err,
        NmsError::BufferTooSmall {
            what: "score",
            needed: 4,
            got: 3,
        }
    );

    let mut scores = scores;
    let err = nms_detection(
        CandidateView::new(&mut scores, &coords[..15], 4, 4),
        &mut dest,
        &cfg,
    )
    .unwrap_err();
    assert!(matches!(err, NmsError::BufferTooSmall { what: "coordinate", .. }));

    let mut small_dest = vec![0.0f32; 19];
    let err = nms_detection(set.as_view_mut(), &mut small_dest, &cfg).unwrap_err();
    assert!(matches!(err, NmsError::BufferTooSmall { what: "destination", .. }));
}

#[test]
fn planar_stride_must_cover_the_keep_budget() {
    let mut set = CandidateSet::from_boxes(&unit_boxes(8));
    let cfg = NmsConfig::default()
        .with_keep(6)
        .with_layout(OutputLayout::Planar { stride: 4 });
    let mut dest = vec![0.0f32; 64];
    let err = nms_detection(set.as_view_mut(), &mut dest, &cfg).unwrap_err();
    assert_eq!(err, NmsError::InvalidStride { count: 6, stride: 4 });
}

#[test]
fn sparse_destination_must_match_candidate_count() {
    let mut set = CandidateSet::from_boxes(&unit_boxes(8));
    let cfg = NmsConfig::default()
        .with_keep(1)
        .with_layout(OutputLayout::SparseOverwrite);
    let mut dest = vec![0.0f32; 7];
    let err = nms_detection(set.as_view_mut(), &mut dest, &cfg).unwrap_err();
    assert_eq!(
        err,
        NmsError::BufferTooSmall {
            what: "destination",
            needed: 8,
            got: 7,
        }
    );
}

#[test]
fn undersized_scratch_is_a_configuration_error() {
    let mut set = CandidateSet::from_boxes(&unit_boxes(8));
    let cfg = NmsConfig::default().with_scratch_bytes(256);
    let mut dest = vec![0.0f32; 40];
    let err = nms_detection(set.as_view_mut(), &mut dest, &cfg).unwrap_err();
    assert!(matches!(err, NmsError::ScratchTooSmall { got: 256, .. }));
    assert!(set.scores().iter().all(|&s| s == 0.5));
}

#[test]
fn local_destination_shrinks_the_reservation() {
    // 9 * 64 lanes + 64 best record, no staging
    let bytes = (9 * 64 + 64) * 4;
    let request = |destination: MemoryTier| PlanRequest {
        count: 10,
        workers: 1,
        scratch_bytes: bytes,
        source: MemoryTier::Main,
        staging_boxes: if destination == MemoryTier::Local { 0 } else { 256 },
    };
    assert!(TilingPlan::new::<f32>(request(MemoryTier::Local)).is_ok());
    assert!(TilingPlan::new::<f32>(request(MemoryTier::Main)).is_err());
}

#[test]
fn partition_covers_every_candidate_once() {
    for count in [0usize, 1, 3, 4, 63, 64, 65, 1001] {
        for workers in [1usize, 2, 4] {
            let slices = partition(count, workers);
            assert_eq!(slices.len(), workers);
            let mut next = 0;
            for s in &slices {
                assert_eq!(s.start, next);
                next = s.end();
            }
            assert_eq!(next, count);
            let max = slices.iter().map(|s| s.len).max().unwrap();
            let min = slices.iter().map(|s| s.len).min().unwrap();
            assert!(max - min <= 1);
        }
    }
}

#[test]
fn error_messages_are_descriptive() {
    let err = NmsError::ScratchTooSmall {
        needed: 1024,
        got: 10,
    };
    assert_eq!(
        err.to_string(),
        "scratch capacity too small: needed at least 1024 bytes, got 10"
    );
    assert_eq!(
        NmsError::WorkerPanicked { worker: 3 }.to_string(),
        "worker 3 panicked"
    );
}

#[test]
fn parallel_sweep_depends_on_rayon() {
    let result = NmsConfig::default().with_parallel(true).validate();
    if cfg!(feature = "rayon") {
        assert_eq!(result, Ok(()));
    } else {
        assert_eq!(
            result,
            Err(NmsError::InvalidInput(
                "parallel sweep requires the rayon feature"
            ))
        );
    }
}
