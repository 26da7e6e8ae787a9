//! Reference scenarios: stationary ball, kicked ball, late frame, out-of-bounds sighting

use std::time::Instant;

use vision_filter_rs::association::RejectReason;
use vision_filter_rs::bench_utils::{rolling_ball, stationary_ball};
use vision_filter_rs::common::ground_truth::BallTrajectory;
use vision_filter_rs::{DetectionFrame, FrameIngest, ObjectClass, PipelineEvent, TrackStatus, TrackerConfig};

use crate::helpers::assertions::{assert_position_close, assert_store_psd, count_events};
use crate::helpers::setup::{debug_filter, debug_filter_with, division_b, init_logging, open_field, FRAME_DT};

#[test]
fn test_stationary_ball_confirmed_throughout() {
    init_logging();
    let frames = stationary_ball(625).generate();
    assert_eq!(frames.len(), 625);

    let mut filter = debug_filter();
    let confirm_hits = filter.config().lifecycle.confirm_hits as usize;
    for (k, frame) in frames.into_iter().enumerate() {
        filter.process_frame(frame);
        filter.finish_cycle();

        let balls: Vec<_> = filter.store().ball_tracks().collect();
        assert_eq!(balls.len(), 1, "frame {}", k);
        if k + 1 >= confirm_hits {
            assert_eq!(balls[0].status, TrackStatus::Confirmed, "frame {}", k);
        }
    }

    let events = filter.reporter().events();
    assert_eq!(count_events(events, |e| matches!(e, PipelineEvent::TrackCreated { .. })), 1);
    assert_eq!(count_events(events, |e| matches!(e, PipelineEvent::TrackLost { .. })), 0);
    assert_eq!(count_events(events, |e| matches!(e, PipelineEvent::TrackDeleted { .. })), 0);

    let tick = filter.tick(624.0 * FRAME_DT);
    let ball = tick.ball().expect("ball emitted");
    assert_position_close(ball.position, [0.0, 0.0], 5.0, "stationary ball");
    assert!(ball.velocity[0].hypot(ball.velocity[1]) < 150.0);
}

#[test]
fn test_kicked_ball_follows_friction_trajectory() {
    let truth = BallTrajectory::rolling([0.0, 0.0], [8000.0, 8000.0], 686.0);
    // 2 s at 62.5 Hz, both ends included
    let frames = rolling_ball(126, 686.0).generate();
    let t_end = frames.last().map(|f| f.t_capture).unwrap();
    assert!((t_end - 2.0).abs() < 1e-9);

    let mut filter = debug_filter_with(TrackerConfig::default(), &open_field());
    filter.process_frames(frames);

    let events = filter.reporter().events();
    assert_eq!(count_events(events, |e| matches!(e, PipelineEvent::TrackCreated { .. })), 1);
    assert_eq!(count_events(events, |e| matches!(e, PipelineEvent::TrackLost { .. })), 0);
    assert_eq!(count_events(events, |e| matches!(e, PipelineEvent::TrackReset { .. })), 0);

    let tick = filter.tick(2.0);
    let ball = tick.ball().expect("ball emitted");
    assert_eq!(ball.status, TrackStatus::Confirmed);

    let expected = truth.position_at(2.0);
    let displacement = expected[0].hypot(expected[1]);
    assert_position_close(ball.position, expected, 0.02 * displacement, "ball at t=2s");

    let v = truth.velocity_at(2.0);
    assert!((ball.velocity[0] - v[0]).abs() < 0.05 * v[0]);
    assert_store_psd(filter.store());
}

#[test]
fn test_late_frame_dropped_without_mutation() {
    let mut config = TrackerConfig::default();
    config.ingest.max_delay = 0.2;
    let mut filter = debug_filter_with(config.clone(), &division_b());
    let mut ingest = FrameIngest::new(config.ingest);
    let producer = ingest.producer();
    let now = Instant::now();

    for k in 0..40 {
        producer.push_at(DetectionFrame::new(0, k, k as f64 * FRAME_DT).with_ball(0.0, 0.0), now);
    }
    // The newest frame waits for a successor
    assert_eq!(filter.run(&mut ingest, now), 39);
    filter.finish_cycle();

    let released_until = ingest.stats(now).released_until.unwrap();
    let snapshot: Vec<_> = filter
        .store()
        .iter()
        .map(|t| (t.id, t.status, t.last_update, t.mean().clone()))
        .collect();

    let late = DetectionFrame::new(1, 0, released_until - 0.25).with_ball(1000.0, 1000.0);
    assert!(!producer.push_at(late, now));
    assert_eq!(filter.run(&mut ingest, now), 0);
    filter.finish_cycle();

    let after: Vec<_> = filter
        .store()
        .iter()
        .map(|t| (t.id, t.status, t.last_update, t.mean().clone()))
        .collect();
    assert_eq!(snapshot, after);
    assert_eq!(filter.diagnostics().late_frames, 1);
    assert!(filter.reporter().events().iter().any(|e| matches!(
        e,
        PipelineEvent::LateFrameDropped { camera_id: 1, .. }
    )));
}

#[test]
fn test_out_of_bounds_detection_discarded() {
    let mut filter = debug_filter();
    let (half_length, _) = filter.geometry().half_extents();
    filter.process_frames(vec![
        DetectionFrame::new(0, 0, 0.0).with_ball(half_length + 5000.0, 0.0),
        DetectionFrame::new(0, 1, FRAME_DT).with_ball(half_length + 5000.0, 0.0),
    ]);

    assert!(filter.store().is_empty());
    assert_eq!(filter.diagnostics().out_of_bounds, 2);
    assert_eq!(filter.diagnostics().tracks_created, 0);
    assert!(filter.reporter().events().iter().all(|e| matches!(
        e,
        PipelineEvent::DetectionRejected {
            class: ObjectClass::Ball,
            reason: RejectReason::OutOfBounds,
            ..
        }
    )));
}
