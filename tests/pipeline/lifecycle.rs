//! Track lifecycle as seen through the fused output

use vision_filter_rs::reporter::DeleteReason;
use vision_filter_rs::{
    DebugReporter, DetectionFrame, ObjectClass, PipelineEvent, TeamColor, TrackId, TrackStatus, VisionFilter,
};

use crate::helpers::assertions::{assert_scalar_close, assert_store_invariants, count_events};
use crate::helpers::setup::{debug_filter, FRAME_DT};

#[test]
fn test_lost_ball_emitted_within_grace_then_removed() {
    let mut filter = debug_filter();
    let mut t = 0.0;
    let mut k = 0;
    while k < 10 {
        filter.process_frame(DetectionFrame::new(0, k, t).with_ball(500.0, 500.0));
        t += FRAME_DT;
        k += 1;
    }
    let last_seen = t - FRAME_DT;

    // Camera keeps reporting, without the ball
    while t < last_seen + 0.3 {
        filter.process_frame(DetectionFrame::new(0, k, t));
        t += FRAME_DT;
        k += 1;
    }
    filter.finish_cycle();

    let tick = filter.tick(t);
    let ball = tick.ball().expect("lost ball still inside the grace window");
    assert_eq!(ball.status, TrackStatus::Lost);
    assert_scalar_close(ball.last_update, last_seen, 1e-12, "last update");

    while t < last_seen + 1.2 {
        filter.process_frame(DetectionFrame::new(0, k, t));
        t += FRAME_DT;
        k += 1;
    }
    filter.finish_cycle();

    assert!(filter.tick(t).ball().is_none());
    assert!(filter.store().is_empty());
    let events = filter.reporter().events();
    assert_eq!(
        count_events(events, |e| matches!(
            e,
            PipelineEvent::TrackDeleted {
                reason: DeleteReason::MissTimeout,
                ..
            }
        )),
        1
    );
}

#[test]
fn test_two_visible_balls_yield_one_output() {
    let mut filter = debug_filter();
    for k in 0..20 {
        let t = k as f64 * FRAME_DT;
        filter.process_frame(DetectionFrame::new(0, k, t).with_ball(-2000.0, 0.0).with_ball(2000.0, 0.0));
        filter.finish_cycle();
        assert_store_invariants(filter.store());
        assert!(filter.tick(t).estimates.iter().filter(|e| e.class.is_ball()).count() <= 1);
    }
    assert_eq!(filter.store().count_status(TrackStatus::Confirmed), 1);
}

#[test]
fn test_robots_emitted_sorted_with_orientation() {
    let mut filter = debug_filter();
    for k in 0..5 {
        let t = k as f64 * FRAME_DT;
        filter.process_frame(
            DetectionFrame::new(0, k, t)
                .with_robot(TeamColor::Blue, 2, 1000.0, 0.0, 0.5)
                .with_robot(TeamColor::Yellow, 7, -1000.0, 500.0, -1.0)
                .with_robot(TeamColor::Yellow, 1, -1000.0, -500.0, 3.0),
        );
    }
    filter.finish_cycle();

    let tick = filter.tick(4.0 * FRAME_DT);
    let robots: Vec<_> = tick.robots().collect();
    assert_eq!(robots.len(), 3);
    assert!(robots.windows(2).all(|w| w[0].class < w[1].class));
    assert_eq!(
        robots[0].class,
        ObjectClass::Robot {
            team: TeamColor::Yellow,
            id: 1
        }
    );

    let blue = robots[2];
    assert_scalar_close(blue.orientation.unwrap(), 0.5, 0.02, "blue orientation");
    assert!(blue.angular_velocity.is_some());
    assert!(tick.ball().is_none());
}

#[test]
fn test_tentative_robot_not_emitted() {
    let mut filter = debug_filter();
    filter.process_frames(vec![DetectionFrame::new(0, 0, 0.0).with_robot(TeamColor::Blue, 0, 0.0, 0.0, 0.0)]);
    assert_eq!(filter.store().len(), 1);
    assert!(filter.tick(0.0).estimates.is_empty());
}

fn first_id(filter: &VisionFilter<DebugReporter>) -> TrackId {
    filter.store().iter().next().map(|t| t.id).unwrap()
}

#[test]
fn test_track_ids_never_reused() {
    let mut filter = debug_filter();
    filter.process_frames(vec![DetectionFrame::new(0, 0, 0.0).with_ball(0.0, 0.0)]);
    let first = first_id(&filter);

    // Tentative track misses and is deleted, the next one gets a fresh id
    filter.process_frames(vec![
        DetectionFrame::new(0, 1, FRAME_DT),
        DetectionFrame::new(0, 2, 2.0 * FRAME_DT).with_ball(0.0, 0.0),
    ]);
    let second = first_id(&filter);
    assert!(second > first);

    filter.reset();
    filter.process_frames(vec![DetectionFrame::new(0, 0, 0.0).with_ball(0.0, 0.0)]);
    assert!(first_id(&filter) > second);
}
