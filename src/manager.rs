//! Track lifecycle management
//!
//! [`TrackManager`] is the only writer of the [`TrackStore`]. Per frame it
//! commits Kalman updates for matched pairs, creates tracks for unmatched
//! detections and charges misses to unmatched tracks. At the end of a cycle it
//! merges cross-camera duplicates and deletes tracks lost for too long.
//!
//! # State machine
//!
//! ```text
//! Tentative --hits >= confirm_hits--> Confirmed --misses > lost_after--> Lost
//!     |                                   ^                               |
//!     +--miss--> removed                  +------------match--------------+
//!                                                  Lost --timeout--> removed
//! ```
//!
//! Ball tracks obey a single-ball rule: a ball is not promoted while another
//! ball is Confirmed, and promoting a ball removes all Lost balls.

use std::collections::BTreeSet;

use nalgebra::DVector;

use crate::association::AssociationOutcome;
use crate::common::linalg::{information_fuse, mahalanobis_squared};
use crate::config::LifecycleConfig;
use crate::motion::{GaussianState, ModelSet};
use crate::reporter::{DeleteReason, PipelineEvent, ResetCause};
use crate::track::{Track, TrackStatus, TrackStore};
use crate::types::{CameraId, DetectionFrame, ObjectClass, TrackId};

/// Rank used when merging: the survivor keeps the higher of the two
fn status_rank(status: TrackStatus) -> u8 {
    match status {
        TrackStatus::Confirmed => 3,
        TrackStatus::Lost => 2,
        TrackStatus::Tentative => 1,
        TrackStatus::Deleted => 0,
    }
}

/// Applies association outcomes and drives track state transitions
#[derive(Debug, Clone)]
pub struct TrackManager {
    models: ModelSet,
    config: LifecycleConfig,
    /// Tracks left unassigned by a tie during the current cycle
    cycle_ambiguous: BTreeSet<TrackId>,
}

impl TrackManager {
    pub fn new(models: ModelSet, config: LifecycleConfig) -> Self {
        Self {
            models,
            config,
            cycle_ambiguous: BTreeSet::new(),
        }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    // ========================================================================
    // Per-frame
    // ========================================================================

    /// Reset every track whose state is no longer a valid Gaussian.
    ///
    /// Run before association so a corrupted covariance is never used for
    /// gating or carried into an update.
    pub fn sanitize(&self, store: &mut TrackStore, events: &mut Vec<PipelineEvent>) {
        let unstable: Vec<TrackId> = store
            .iter()
            .filter(|track| !track.state.is_valid())
            .map(|track| track.id)
            .collect();
        for track_id in unstable {
            let cause = ResetCause::NumericalInstability("covariance is not symmetric positive semi-definite".to_string());
            self.reset_track(store, track_id, cause, events);
        }
    }

    /// Apply one frame's association outcome to `store`.
    ///
    /// `outcome` must have been computed against `store` for `frame`.
    pub fn apply_frame(
        &mut self,
        store: &mut TrackStore,
        frame: &DetectionFrame,
        outcome: &AssociationOutcome,
        events: &mut Vec<PipelineEvent>,
    ) {
        let t = frame.t_capture;
        let camera_id = frame.camera_id;

        for track in store.iter_mut() {
            track.expire_observers(t, self.config.observer_timeout);
        }

        for rejection in &outcome.rejected {
            let detection = &outcome.detections[rejection.detection];
            events.push(PipelineEvent::DetectionRejected {
                camera_id,
                class: detection.class,
                reason: rejection.reason,
                x: detection.x(),
                y: detection.y(),
            });
        }

        // Tracks that must not be charged a miss for this frame
        let mut touched: BTreeSet<TrackId> = outcome.ambiguous_tracks.iter().copied().collect();
        self.cycle_ambiguous.extend(&outcome.ambiguous_tracks);
        if !outcome.ambiguous_tracks.is_empty() {
            events.push(PipelineEvent::AmbiguousAssociation {
                camera_id,
                tracks: outcome.ambiguous_tracks.clone(),
                detections: outcome.ambiguous_detections.len(),
                t,
            });
        }

        for m in &outcome.matches {
            touched.insert(m.track_id);
            let detection = &outcome.detections[m.detection];
            let Some(track) = store.get(m.track_id) else {
                continue;
            };
            if m.stale {
                events.push(PipelineEvent::StaleDetection {
                    camera_id,
                    track_id: m.track_id,
                    t_capture: detection.t_capture,
                    last_update: track.last_update,
                });
                continue;
            }

            let model = self.models.for_class(&track.class);
            let predicted = match outcome.predictions.get(&m.track_id) {
                Some(state) => state.clone(),
                None => model.predict(&track.state, t - track.last_update),
            };
            match model.update(&predicted, &detection.measurement) {
                Ok(state) => self.commit_hit(store, m.track_id, state, &detection.measurement, camera_id, t, events),
                Err(e) => self.reset_track(store, m.track_id, ResetCause::NumericalInstability(e.to_string()), events),
            }
        }

        for &j in &outcome.unmatched_detections {
            let detection = &outcome.detections[j];
            let model = self.models.for_class(&detection.class);

            if let ObjectClass::Robot { team, id } = detection.class {
                if let Some(existing) = store.robot_track(team, id) {
                    let existing_id = existing.id;
                    if existing.status == TrackStatus::Lost && !touched.contains(&existing_id) {
                        touched.insert(existing_id);
                        self.reacquire(store, existing_id, &detection.measurement, camera_id, t, events);
                    } else {
                        events.push(PipelineEvent::RobotOutlier {
                            camera_id,
                            track_id: existing_id,
                            class: detection.class,
                            t,
                        });
                    }
                    continue;
                }
            }

            let state = model.initial_state(&detection.measurement);
            let track_id = store.insert(detection.class, state, detection.measurement.clone(), camera_id, t);
            touched.insert(track_id);
            events.push(PipelineEvent::TrackCreated {
                track_id,
                class: detection.class,
                camera_id,
                t,
            });
        }

        for &track_id in &outcome.unmatched_tracks {
            if touched.contains(&track_id) {
                continue;
            }
            self.charge_miss(store, track_id, camera_id, t, events);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn commit_hit(
        &self,
        store: &mut TrackStore,
        track_id: TrackId,
        state: GaussianState,
        measurement: &DVector<f64>,
        camera_id: CameraId,
        t: f64,
        events: &mut Vec<PipelineEvent>,
    ) {
        let Some(track) = store.get_mut(track_id) else {
            return;
        };
        track.state = state;
        track.last_update = t;
        track.last_measurement = measurement.clone();
        track.hits = track.hits.saturating_add(1);
        track.misses = 0;
        track.total_updates += 1;
        track.note_contribution(camera_id, t);

        let status = track.status;
        let hits = track.hits;
        match status {
            TrackStatus::Tentative if hits >= self.config.confirm_hits => self.promote(store, track_id, t, events),
            TrackStatus::Lost => self.promote(store, track_id, t, events),
            _ => {}
        }
    }

    /// Move a track to Confirmed, honouring the single-ball rule
    fn promote(&self, store: &mut TrackStore, track_id: TrackId, t: f64, events: &mut Vec<PipelineEvent>) {
        let Some(track) = store.get(track_id) else {
            return;
        };
        let class = track.class;
        let previous = track.status;

        if class.is_ball() {
            let blocked = store
                .ball_tracks()
                .any(|b| b.id != track_id && b.status == TrackStatus::Confirmed);
            if blocked {
                return;
            }
            let superseded: Vec<TrackId> = store
                .ball_tracks()
                .filter(|b| b.id != track_id && b.status == TrackStatus::Lost)
                .map(|b| b.id)
                .collect();
            for id in superseded {
                store.remove(id);
                events.push(PipelineEvent::TrackDeleted {
                    track_id: id,
                    class,
                    reason: DeleteReason::Superseded,
                    t,
                });
            }
        }

        if let Some(track) = store.get_mut(track_id) {
            track.status = TrackStatus::Confirmed;
        }
        events.push(match previous {
            TrackStatus::Lost => PipelineEvent::TrackRecovered { track_id, class, t },
            _ => PipelineEvent::TrackConfirmed { track_id, class, t },
        });
    }

    /// Reset a track to Tentative around its last valid measurement
    fn reset_track(&self, store: &mut TrackStore, track_id: TrackId, cause: ResetCause, events: &mut Vec<PipelineEvent>) {
        let Some(track) = store.get_mut(track_id) else {
            return;
        };
        let model = self.models.for_class(&track.class);
        track.state = model.initial_state(&track.last_measurement);
        track.status = TrackStatus::Tentative;
        track.hits = 1;
        track.misses = 0;
        events.push(PipelineEvent::TrackReset {
            track_id,
            class: track.class,
            cause,
            t: track.last_update,
        });
    }

    /// Restart a Lost robot track at a fresh detection
    fn reacquire(
        &self,
        store: &mut TrackStore,
        track_id: TrackId,
        measurement: &DVector<f64>,
        camera_id: CameraId,
        t: f64,
        events: &mut Vec<PipelineEvent>,
    ) {
        let Some(track) = store.get_mut(track_id) else {
            return;
        };
        if t < track.last_update {
            return;
        }
        let model = self.models.for_class(&track.class);
        track.state = model.initial_state(measurement);
        track.last_measurement = measurement.clone();
        track.last_update = t;
        track.status = TrackStatus::Tentative;
        track.hits = 1;
        track.misses = 0;
        track.total_updates += 1;
        track.note_contribution(camera_id, t);
        events.push(PipelineEvent::TrackReset {
            track_id,
            class: track.class,
            cause: ResetCause::Reacquired,
            t,
        });
    }

    fn charge_miss(
        &self,
        store: &mut TrackStore,
        track_id: TrackId,
        camera_id: CameraId,
        t: f64,
        events: &mut Vec<PipelineEvent>,
    ) {
        let Some(track) = store.get_mut(track_id) else {
            return;
        };
        if t < track.last_update || !track.expects_camera(camera_id) {
            return;
        }
        track.misses = track.misses.saturating_add(1);
        track.hits = 0;

        let class = track.class;
        let status = track.status;
        let misses = track.misses;
        match status {
            TrackStatus::Tentative => {
                store.remove(track_id);
                events.push(PipelineEvent::TrackDeleted {
                    track_id,
                    class,
                    reason: DeleteReason::TentativeMiss,
                    t,
                });
            }
            TrackStatus::Confirmed if misses > self.config.lost_after_misses => {
                track.status = TrackStatus::Lost;
                events.push(PipelineEvent::TrackLost { track_id, class, t });
            }
            _ => {}
        }
    }

    // ========================================================================
    // Per-cycle
    // ========================================================================

    /// Finish a cycle ending at time `t`: merge duplicates, delete timed-out
    /// tracks, and clear per-cycle bookkeeping.
    pub fn end_cycle(&mut self, store: &mut TrackStore, t: f64, events: &mut Vec<PipelineEvent>) {
        self.merge_duplicates(store, t, events);
        self.expire_lost(store, t, events);

        for track in store.iter_mut() {
            track.cycle_cameras.clear();
        }
        self.cycle_ambiguous.clear();
    }

    fn merge_eligible(&self, a: &Track, b: &Track) -> bool {
        if a.class != b.class {
            return false;
        }
        let a_ambiguous = self.cycle_ambiguous.contains(&a.id);
        let b_ambiguous = self.cycle_ambiguous.contains(&b.id);
        let a_touched = !a.cycle_cameras.is_empty() || a_ambiguous;
        let b_touched = !b.cycle_cameras.is_empty() || b_ambiguous;
        if !a_touched || !b_touched {
            return false;
        }
        let differ = a.cycle_cameras.iter().any(|c| !b.cycle_cameras.contains(c))
            || b.cycle_cameras.iter().any(|c| !a.cycle_cameras.contains(c));
        differ || a_ambiguous || b_ambiguous
    }

    /// Both states at the later of the two update times
    fn aligned_states(&self, a: &Track, b: &Track) -> (GaussianState, GaussianState, f64) {
        let model = self.models.for_class(&a.class);
        let t = a.last_update.max(b.last_update);
        (
            model.predict(&a.state, t - a.last_update),
            model.predict(&b.state, t - b.last_update),
            t,
        )
    }

    /// Squared Mahalanobis distance between the measured components of two tracks
    pub fn merge_distance(&self, a: &Track, b: &Track) -> f64 {
        let model = self.models.for_class(&a.class);
        let (sa, sb, _) = self.aligned_states(a, b);
        let h = model.measurement_matrix();
        let residual = model.measurement_residual(&(&h * &sb.mean), &(&h * &sa.mean));
        let s = &h * (&sa.covariance + &sb.covariance) * h.transpose();
        mahalanobis_squared(&residual, &s)
    }

    fn merge_duplicates(&self, store: &mut TrackStore, t: f64, events: &mut Vec<PipelineEvent>) {
        // Merge the closest eligible pair until none is left
        loop {
            let best = {
                let tracks: Vec<&Track> = store.iter().collect();
                let mut best: Option<(TrackId, TrackId, f64)> = None;
                for (i, a) in tracks.iter().enumerate() {
                    for b in &tracks[i + 1..] {
                        if !self.merge_eligible(a, b) {
                            continue;
                        }
                        let d2 = self.merge_distance(a, b);
                        if d2 < self.config.merge_gate && best.map_or(true, |(_, _, d)| d2 < d) {
                            best = Some((a.id, b.id, d2));
                        }
                    }
                }
                best
            };

            let Some((survivor, absorbed, d2)) = best else {
                break;
            };
            if !self.merge_pair(store, survivor, absorbed) {
                break;
            }
            if let Some(track) = store.get(survivor) {
                events.push(PipelineEvent::TracksMerged {
                    survivor,
                    absorbed,
                    class: track.class,
                    distance: d2,
                    t,
                });
            }
        }
    }

    /// Fuse `absorbed` into `survivor` and remove it. Returns false if fusion failed.
    fn merge_pair(&self, store: &mut TrackStore, survivor: TrackId, absorbed: TrackId) -> bool {
        let (Some(a), Some(b)) = (store.get(survivor), store.get(absorbed)) else {
            return false;
        };
        let model = self.models.for_class(&a.class);
        let (sa, sb, t_fused) = self.aligned_states(a, b);
        let fused = information_fuse(&sa.mean, &sa.covariance, &sb.mean, &sb.covariance, |x, y| {
            model.state_residual(x, y)
        });
        let (mut mean, covariance) = match fused {
            Ok(fused) => fused,
            Err(e) => {
                log::warn!("merge of {} into {} failed: {}", absorbed, survivor, e);
                return false;
            }
        };
        model.normalize(&mut mean);

        let Some(absorbed_status) = store.get(absorbed).map(|t| t.status) else {
            return false;
        };
        let Some(b) = store.remove(absorbed) else {
            return false;
        };
        let Some(a) = store.get_mut(survivor) else {
            return false;
        };
        if status_rank(absorbed_status) > status_rank(a.status) {
            a.status = absorbed_status;
        }
        if b.last_update > a.last_update {
            a.last_measurement = b.last_measurement;
        }
        a.state = GaussianState::new(mean, covariance);
        a.last_update = t_fused;
        a.created_at = a.created_at.min(b.created_at);
        a.hits = a.hits.max(b.hits);
        a.misses = a.misses.min(b.misses);
        a.total_updates += b.total_updates;
        for camera in b.cycle_cameras {
            if !a.cycle_cameras.contains(&camera) {
                a.cycle_cameras.push(camera);
            }
        }
        for observer in b.observers {
            a.note_observer(observer);
        }
        true
    }

    fn expire_lost(&self, store: &mut TrackStore, t: f64, events: &mut Vec<PipelineEvent>) {
        let expired: Vec<(TrackId, ObjectClass)> = store
            .iter()
            .filter(|track| track.status == TrackStatus::Lost)
            .filter(|track| {
                let limit = match track.class {
                    ObjectClass::Ball => self.config.ball_delete_after,
                    ObjectClass::Robot { .. } => self.config.robot_delete_after,
                };
                t - track.last_update > limit
            })
            .map(|track| (track.id, track.class))
            .collect();

        for (track_id, class) in expired {
            store.remove(track_id);
            events.push(PipelineEvent::TrackDeleted {
                track_id,
                class,
                reason: DeleteReason::MissTimeout,
                t,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::association::Associator;
    use crate::config::AssociationConfig;
    use crate::geometry::FieldGeometry;
    use crate::motion::MotionModel;
    use crate::types::TeamColor;

    struct Harness {
        store: TrackStore,
        associator: Associator,
        manager: TrackManager,
        events: Vec<PipelineEvent>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                store: TrackStore::new(),
                associator: Associator::new(
                    ModelSet::default(),
                    AssociationConfig::default(),
                    FieldGeometry::division_b(),
                ),
                manager: TrackManager::new(ModelSet::default(), LifecycleConfig::default()),
                events: Vec::new(),
            }
        }

        /// Process a single frame as its own cycle
        fn step(&mut self, frame: DetectionFrame) {
            self.manager.sanitize(&mut self.store, &mut self.events);
            let outcome = self.associator.associate(&self.store, &frame);
            self.manager
                .apply_frame(&mut self.store, &frame, &outcome, &mut self.events);
            self.manager
                .end_cycle(&mut self.store, frame.t_capture, &mut self.events);
        }

        fn only_ball(&self) -> &Track {
            let balls: Vec<&Track> = self.store.ball_tracks().collect();
            assert_eq!(balls.len(), 1, "expected exactly one ball track");
            balls[0]
        }
    }

    #[test]
    fn test_confirm_after_three_hits() {
        let mut h = Harness::new();
        for k in 0..3 {
            h.step(DetectionFrame::new(0, k, k as f64 * 0.016).with_ball(0.0, 0.0));
        }
        assert_eq!(h.only_ball().status, TrackStatus::Confirmed);
        assert!(h
            .events
            .iter()
            .any(|e| matches!(e, PipelineEvent::TrackConfirmed { .. })));
    }

    #[test]
    fn test_tentative_deleted_on_first_miss() {
        let mut h = Harness::new();
        h.step(DetectionFrame::new(0, 0, 0.0).with_ball(0.0, 0.0));
        h.step(DetectionFrame::new(0, 1, 0.016));
        assert!(h.store.is_empty());
        assert!(h.events.iter().any(|e| matches!(
            e,
            PipelineEvent::TrackDeleted {
                reason: DeleteReason::TentativeMiss,
                ..
            }
        )));
    }

    #[test]
    fn test_other_camera_does_not_charge_miss() {
        let mut h = Harness::new();
        h.step(DetectionFrame::new(0, 0, 0.0).with_ball(0.0, 0.0));
        // Camera 1 does not see the ball; it never observed it
        h.step(DetectionFrame::new(1, 0, 0.016));
        assert_eq!(h.only_ball().misses, 0);
    }

    #[test]
    fn test_confirmed_goes_lost_then_deleted() {
        let mut h = Harness::new();
        let dt = 0.016;
        let mut t = 0.0;
        for k in 0..5 {
            h.step(DetectionFrame::new(0, k, t).with_ball(0.0, 0.0));
            t += dt;
        }
        let id = h.only_ball().id;

        for k in 5..16 {
            h.step(DetectionFrame::new(0, k, t));
            t += dt;
        }
        assert_eq!(h.store.get(id).map(|t| t.status), Some(TrackStatus::Lost));

        let mut k = 16;
        while t < 1.5 {
            h.step(DetectionFrame::new(0, k, t));
            t += dt;
            k += 1;
        }
        assert!(h.store.get(id).is_none());
    }

    #[test]
    fn test_lost_recovers_on_match() {
        let mut h = Harness::new();
        let mut t = 0.0;
        for k in 0..3 {
            h.step(DetectionFrame::new(0, k, t).with_ball(0.0, 0.0));
            t += 0.016;
        }
        for k in 3..14 {
            h.step(DetectionFrame::new(0, k, t));
            t += 0.016;
        }
        assert_eq!(h.only_ball().status, TrackStatus::Lost);

        h.step(DetectionFrame::new(0, 14, t).with_ball(0.0, 0.0));
        assert_eq!(h.only_ball().status, TrackStatus::Confirmed);
        assert!(h
            .events
            .iter()
            .any(|e| matches!(e, PipelineEvent::TrackRecovered { .. })));
    }

    #[test]
    fn test_single_confirmed_ball() {
        let mut h = Harness::new();
        // Two far apart balls from two cameras
        for k in 0..6 {
            let t = k as f64 * 0.016;
            h.step(DetectionFrame::new(0, k, t).with_ball(-2000.0, 0.0));
            h.step(DetectionFrame::new(1, k, t + 0.008).with_ball(2000.0, 0.0));
        }
        assert_eq!(h.store.ball_tracks().count(), 2);
        assert_eq!(h.store.count_status(TrackStatus::Confirmed), 1);
    }

    #[test]
    fn test_robot_reacquired_after_lost() {
        let mut h = Harness::new();
        let mut t = 0.0;
        for k in 0..3 {
            h.step(DetectionFrame::new(0, k, t).with_robot(TeamColor::Blue, 4, 0.0, 0.0, 0.0));
            t += 0.016;
        }
        for k in 3..14 {
            h.step(DetectionFrame::new(0, k, t));
            t += 0.016;
        }
        let track = h.store.robot_track(TeamColor::Blue, 4).unwrap();
        assert_eq!(track.status, TrackStatus::Lost);
        let id = track.id;

        // Far outside the robot's gate
        h.step(DetectionFrame::new(0, 14, t).with_robot(TeamColor::Blue, 4, 3000.0, 1000.0, 1.0));
        let track = h.store.robot_track(TeamColor::Blue, 4).unwrap();
        assert_eq!(track.id, id);
        assert_eq!(track.status, TrackStatus::Tentative);
        assert!((track.mean()[0] - 3000.0).abs() < 1e-9);
        assert_eq!(h.store.len(), 1);
    }

    #[test]
    fn test_robot_outlier_does_not_duplicate() {
        let mut h = Harness::new();
        h.step(DetectionFrame::new(0, 0, 0.0).with_robot(TeamColor::Yellow, 1, 0.0, 0.0, 0.0));
        h.step(DetectionFrame::new(0, 1, 0.016).with_robot(TeamColor::Yellow, 1, 0.0, 0.0, 0.0));
        h.step(DetectionFrame::new(1, 0, 0.02).with_robot(TeamColor::Yellow, 1, 4000.0, 0.0, 0.0));

        assert_eq!(h.store.len(), 1);
        assert!(h
            .events
            .iter()
            .any(|e| matches!(e, PipelineEvent::RobotOutlier { .. })));
    }

    #[test]
    fn test_merge_cross_camera_duplicates() {
        let models = ModelSet::default();
        let mut manager = TrackManager::new(models.clone(), LifecycleConfig::default());
        let mut store = TrackStore::new();
        let za = DVector::from_vec(vec![0.0, 0.0]);
        let zb = DVector::from_vec(vec![2.0, 1.0]);
        let a = store.insert(ObjectClass::Ball, models.ball.initial_state(&za), za, 0, 1.0);
        let b = store.insert(ObjectClass::Ball, models.ball.initial_state(&zb), zb, 1, 1.0);

        let mut events = Vec::new();
        manager.end_cycle(&mut store, 1.0, &mut events);

        assert_eq!(store.len(), 1);
        let survivor = store.get(a).unwrap();
        assert!(store.get(b).is_none());
        // Equal covariances: the fused mean is the midpoint
        assert!((survivor.mean()[0] - 1.0).abs() < 1e-9);
        assert!((survivor.mean()[1] - 0.5).abs() < 1e-9);
        assert!(survivor.covariance()[(0, 0)] < models.ball.initial_position_variance);
        assert!(matches!(
            events[0],
            PipelineEvent::TracksMerged { survivor, absorbed, .. } if survivor == a && absorbed == b
        ));
    }

    #[test]
    fn test_merge_survivor_takes_absorbed_status() {
        let models = ModelSet::default();
        let mut manager = TrackManager::new(models.clone(), LifecycleConfig::default());
        let mut store = TrackStore::new();
        let za = DVector::from_vec(vec![0.0, 0.0]);
        let zb = DVector::from_vec(vec![2.0, 1.0]);
        let a = store.insert(ObjectClass::Ball, models.ball.initial_state(&za), za, 0, 1.0);
        let b = store.insert(ObjectClass::Ball, models.ball.initial_state(&zb), zb, 1, 1.0);
        store.get_mut(b).unwrap().status = TrackStatus::Confirmed;

        let mut events = Vec::new();
        manager.end_cycle(&mut store, 1.0, &mut events);

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(a).unwrap().status, TrackStatus::Confirmed);
    }

    #[test]
    fn test_same_camera_tracks_not_merged() {
        let models = ModelSet::default();
        let mut manager = TrackManager::new(models.clone(), LifecycleConfig::default());
        let mut store = TrackStore::new();
        let za = DVector::from_vec(vec![0.0, 0.0]);
        let zb = DVector::from_vec(vec![2.0, 1.0]);
        store.insert(ObjectClass::Ball, models.ball.initial_state(&za), za, 0, 1.0);
        store.insert(ObjectClass::Ball, models.ball.initial_state(&zb), zb, 0, 1.0);

        let mut events = Vec::new();
        manager.end_cycle(&mut store, 1.0, &mut events);
        assert_eq!(store.len(), 2);
        assert!(events.is_empty());
    }

    #[test]
    fn test_reset_on_corrupted_covariance() {
        let mut h = Harness::new();
        h.step(DetectionFrame::new(0, 0, 0.0).with_ball(10.0, 20.0));
        let id = h.only_ball().id;
        h.step(DetectionFrame::new(0, 1, 0.016).with_ball(10.0, 20.0));

        // Corrupt the velocity block so the next update fails its PSD check
        {
            let track = h.store.get_mut(id).unwrap();
            track.state.covariance[(2, 3)] = 1e12;
        }
        h.step(DetectionFrame::new(0, 2, 0.032).with_ball(10.0, 20.0));

        let track = h.store.get(id).unwrap();
        assert_eq!(track.status, TrackStatus::Tentative);
        assert!(track.state.is_valid());
        assert!(h
            .events
            .iter()
            .any(|e| matches!(e, PipelineEvent::TrackReset { .. })));
    }
}
