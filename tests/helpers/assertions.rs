//! Assertion functions for numerical comparisons with tolerance

use vision_filter_rs::common::linalg::is_positive_semidefinite;
use vision_filter_rs::{PipelineEvent, TrackStatus, TrackStore};

/// Compare scalar values with tolerance
pub fn assert_scalar_close(actual: f64, expected: f64, tolerance: f64, field_name: &str) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= tolerance,
        "{}: expected {}, got {} (diff: {}, tolerance: {})",
        field_name,
        expected,
        actual,
        diff,
        tolerance
    );
}

/// Compare a 2D position with a Euclidean tolerance
pub fn assert_position_close(actual: [f64; 2], expected: [f64; 2], tolerance: f64, field_name: &str) {
    let diff = (actual[0] - expected[0]).hypot(actual[1] - expected[1]);
    assert!(
        diff <= tolerance,
        "{}: expected {:?}, got {:?} (distance: {}, tolerance: {})",
        field_name,
        expected,
        actual,
        diff,
        tolerance
    );
}

/// Every track covariance is symmetric and positive semi-definite
pub fn assert_store_psd(store: &TrackStore) {
    for track in store.iter() {
        let p = track.covariance();
        assert!(
            is_positive_semidefinite(p),
            "{} covariance not PSD: {}",
            track.id,
            p
        );
    }
}

/// At most one Confirmed ball and one live track per robot key
pub fn assert_store_invariants(store: &TrackStore) {
    let confirmed_balls = store
        .ball_tracks()
        .filter(|t| t.status == TrackStatus::Confirmed)
        .count();
    assert!(confirmed_balls <= 1, "{} confirmed balls", confirmed_balls);

    let mut keys: Vec<_> = store.iter().filter_map(|t| t.robot_key()).collect();
    let total = keys.len();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), total, "duplicate robot tracks");
}

/// Count events matching a predicate
pub fn count_events<F>(events: &[PipelineEvent], predicate: F) -> usize
where
    F: Fn(&PipelineEvent) -> bool,
{
    events.iter().filter(|e| predicate(e)).count()
}
