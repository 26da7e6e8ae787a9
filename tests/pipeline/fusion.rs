//! Multi-camera fusion: overlapping cameras, duplicate merging

use vision_filter_rs::common::ground_truth::{BallTrajectory, RobotTrajectory, Scenario, SimulatedCamera};
use vision_filter_rs::{DetectionFrame, ObjectClass, PipelineEvent, TeamColor, TrackStatus, TrackerConfig};

use crate::helpers::assertions::{assert_position_close, assert_store_invariants, assert_store_psd, count_events};
use crate::helpers::setup::{debug_filter, debug_filter_with, division_b};

fn overlapping_cameras() -> Vec<SimulatedCamera> {
    vec![
        SimulatedCamera::ideal(0).with_noise(2.0, 0.005).with_x_range(-5000.0, 500.0),
        SimulatedCamera::ideal(1)
            .with_noise(2.0, 0.005)
            .with_x_range(-500.0, 5000.0)
            .with_phase(0.004),
    ]
}

#[test]
fn test_overlapping_cameras_one_track_per_object() {
    let scenario = Scenario::new(62.5, 300)
        .with_cameras(overlapping_cameras())
        .with_ball(BallTrajectory::rolling([-2000.0, -1000.0], [1500.0, 600.0], 686.0))
        .with_robot(RobotTrajectory::parked(TeamColor::Yellow, 0, -3000.0, 0.0, 0.0))
        .with_robot(RobotTrajectory::parked(TeamColor::Blue, 3, 0.0, 1500.0, 1.0))
        .with_robot(RobotTrajectory::parked(TeamColor::Blue, 4, 2500.0, -1500.0, -2.0));
    let frames = scenario.generate();
    let t_end = frames.last().map(|f| f.t_capture).unwrap();

    let mut filter = debug_filter();
    for frame in frames {
        filter.process_frame(frame);
        assert_store_invariants(filter.store());
    }
    filter.finish_cycle();
    assert_store_psd(filter.store());

    let store = filter.store();
    assert_eq!(store.ball_tracks().count(), 1);
    assert_eq!(store.len(), 4);
    assert!(store.iter().all(|t| t.status == TrackStatus::Confirmed));

    let tick = filter.tick(t_end);
    assert_eq!(tick.robots().count(), 3);
    let ball = tick.ball().unwrap();
    // Stops at x = -2000 + 1500²/(2·686)
    let truth = BallTrajectory::rolling([-2000.0, -1000.0], [1500.0, 600.0], 686.0).position_at(t_end);
    assert_position_close(ball.position, truth, 20.0, "ball in overlap");

    // The robot in the overlap is updated by both cameras
    let shared = filter.store().robot_track(TeamColor::Blue, 3).unwrap();
    assert_eq!(shared.observers.len(), 2);
}

#[test]
fn test_cross_camera_duplicates_merged() {
    let mut config = TrackerConfig::default();
    // A tight association gate leaves near-duplicates for the merge step
    config.association.ball_gate = 2.0;
    let mut filter = debug_filter_with(config, &division_b());

    filter.process_frames(vec![
        DetectionFrame::new(0, 0, 0.0).with_ball(0.0, 0.0),
        DetectionFrame::new(1, 0, 0.0004).with_ball(12.0, 0.0),
    ]);

    let events = filter.reporter().events();
    assert_eq!(count_events(events, |e| matches!(e, PipelineEvent::TrackCreated { .. })), 2);
    assert_eq!(filter.diagnostics().merges, 1);
    assert_eq!(filter.store().len(), 1);

    let survivor = filter.store().ball_tracks().next().unwrap();
    assert_eq!(Some(survivor.id), filter.store().iter().map(|t| t.id).min());
    assert!(survivor.mean()[0] > 0.0 && survivor.mean()[0] < 12.0);
    assert_eq!(survivor.observers.len(), 2);
    assert!(events.iter().any(|e| matches!(
        e,
        PipelineEvent::TracksMerged {
            class: ObjectClass::Ball,
            ..
        }
    )));
}

#[test]
fn test_distant_cross_camera_tracks_kept_apart() {
    let mut filter = debug_filter();
    filter.process_frames(vec![
        DetectionFrame::new(0, 0, 0.0).with_ball(0.0, 0.0),
        DetectionFrame::new(1, 0, 0.0004).with_ball(150.0, 0.0),
    ]);
    assert_eq!(filter.store().ball_tracks().count(), 2);
    assert_eq!(filter.diagnostics().merges, 0);
}
