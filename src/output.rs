//! Fused output
//!
//! [`FusionOutput`] turns the track store into one [`FusedEstimate`] per
//! logical object. [`TickPublisher`] hands ticks to a consumer that may be
//! slower than the tick rate: unread ticks are replaced, never queued.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::FusionConfig;
use crate::motion::ModelSet;
use crate::track::{Track, TrackStatus, TrackStore};
use crate::types::{ObjectClass, TrackId};

/// Estimate of one object at an output tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedEstimate {
    pub class: ObjectClass,
    pub track_id: TrackId,
    /// `[x, y]` in mm
    pub position: [f64; 2],
    /// `[vx, vy]` in mm/s
    pub velocity: [f64; 2],
    /// Robots only, radians
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation: Option<f64>,
    /// Robots only, rad/s
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angular_velocity: Option<f64>,
    /// `sqrt(trace(P_pos) / 2)` in mm
    pub position_std: f64,
    pub status: TrackStatus,
    /// Capture time of the last measurement applied
    pub last_update: f64,
}

/// All estimates for one tick, in emission order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputTick {
    pub sequence: u64,
    pub t: f64,
    pub estimates: Vec<FusedEstimate>,
}

impl OutputTick {
    /// The ball estimate, if one is emitted
    pub fn ball(&self) -> Option<&FusedEstimate> {
        self.estimates.iter().find(|e| e.class.is_ball())
    }

    pub fn robots(&self) -> impl Iterator<Item = &FusedEstimate> {
        self.estimates.iter().filter(|e| !e.class.is_ball())
    }
}

/// Read-only view from the track store to per-object estimates
#[derive(Debug, Clone)]
pub struct FusionOutput {
    models: ModelSet,
    config: FusionConfig,
}

impl FusionOutput {
    pub fn new(models: ModelSet, config: FusionConfig) -> Self {
        Self { models, config }
    }

    /// Estimates at time `t`.
    ///
    /// Emits the confirmed ball, or failing that the most recently updated
    /// lost ball still inside the grace window, then every confirmed robot.
    /// Tracks are extrapolated to `t` when it is later than their last update.
    pub fn estimates(&self, store: &TrackStore, t: f64) -> Vec<FusedEstimate> {
        let mut estimates = Vec::new();

        let ball = store
            .ball_tracks()
            .filter(|b| b.status == TrackStatus::Confirmed)
            .min_by_key(|b| b.id)
            .or_else(|| {
                store
                    .ball_tracks()
                    .filter(|b| b.status == TrackStatus::Lost && t - b.last_update <= self.config.ball_grace)
                    .max_by(|a, b| a.last_update.total_cmp(&b.last_update))
            });
        if let Some(track) = ball {
            estimates.push(self.estimate(track, t));
        }

        let mut robots: Vec<&Track> = store
            .iter()
            .filter(|r| !r.class.is_ball() && r.status == TrackStatus::Confirmed)
            .collect();
        robots.sort_by_key(|r| (r.class, r.id));
        estimates.extend(robots.into_iter().map(|r| self.estimate(r, t)));

        estimates
    }

    fn estimate(&self, track: &Track, t: f64) -> FusedEstimate {
        let model = self.models.for_class(&track.class);
        let state = if t > track.last_update {
            model.predict(&track.state, t - track.last_update)
        } else {
            track.state.clone()
        };
        let p = &state.covariance;
        let position_std = ((p[(0, 0)] + p[(1, 1)]) / 2.0).max(0.0).sqrt();

        let (orientation, angular_velocity) = match track.class {
            ObjectClass::Ball => (None, None),
            ObjectClass::Robot { .. } => (Some(state.mean[2]), Some(state.mean[5])),
        };

        FusedEstimate {
            class: track.class,
            track_id: track.id,
            position: model.position(&state.mean),
            velocity: model.velocity(&state.mean),
            orientation,
            angular_velocity,
            position_std,
            status: track.status,
            last_update: track.last_update,
        }
    }
}

// ============================================================================
// TickPublisher
// ============================================================================

#[derive(Debug, Default)]
struct Slot {
    latest: Mutex<Option<OutputTick>>,
    published: AtomicU64,
    dropped: AtomicU64,
}

/// Single-slot, latest-value tick channel.
///
/// Publishing never blocks on the reader. A tick that is replaced before it
/// was taken counts as dropped. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct TickPublisher {
    slot: Arc<Slot>,
}

impl TickPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `tick` as the latest value. Returns true if an unread tick was dropped.
    pub fn publish(&self, tick: OutputTick) -> bool {
        self.slot.published.fetch_add(1, Ordering::Relaxed);
        let replaced = self.slot.latest.lock().replace(tick).is_some();
        if replaced {
            self.slot.dropped.fetch_add(1, Ordering::Relaxed);
        }
        replaced
    }

    /// Take the latest unread tick
    pub fn take(&self) -> Option<OutputTick> {
        self.slot.latest.lock().take()
    }

    /// Copy of the latest unread tick, leaving it in place
    pub fn peek(&self) -> Option<OutputTick> {
        self.slot.latest.lock().clone()
    }

    pub fn published(&self) -> u64 {
        self.slot.published.load(Ordering::Relaxed)
    }

    /// Ticks replaced before being read
    pub fn dropped(&self) -> u64 {
        self.slot.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::MotionModel;
    use crate::types::TeamColor;
    use nalgebra::DVector;

    fn insert_ball(store: &mut TrackStore, x: f64, t: f64, status: TrackStatus) -> TrackId {
        let z = DVector::from_vec(vec![x, 0.0]);
        let state = ModelSet::default().ball.initial_state(&z);
        let id = store.insert(ObjectClass::Ball, state, z, 0, t);
        store.get_mut(id).unwrap().status = status;
        id
    }

    fn insert_robot(store: &mut TrackStore, team: TeamColor, robot: u32, status: TrackStatus) -> TrackId {
        let z = DVector::from_vec(vec![100.0 * robot as f64, 0.0, 0.5]);
        let state = ModelSet::default().unknown_robot.initial_state(&z);
        let id = store.insert(ObjectClass::Robot { team, id: robot }, state, z, 0, 0.0);
        store.get_mut(id).unwrap().status = status;
        id
    }

    fn output() -> FusionOutput {
        FusionOutput::new(ModelSet::default(), FusionConfig::default())
    }

    #[test]
    fn test_tentative_never_emitted() {
        let mut store = TrackStore::new();
        insert_ball(&mut store, 0.0, 0.0, TrackStatus::Tentative);
        insert_robot(&mut store, TeamColor::Blue, 1, TrackStatus::Tentative);
        assert!(output().estimates(&store, 0.0).is_empty());
    }

    #[test]
    fn test_lost_ball_within_grace() {
        let mut store = TrackStore::new();
        let id = insert_ball(&mut store, 0.0, 1.0, TrackStatus::Lost);

        let estimates = output().estimates(&store, 1.2);
        assert_eq!(estimates.len(), 1);
        assert_eq!(estimates[0].track_id, id);
        assert_eq!(estimates[0].status, TrackStatus::Lost);

        assert!(output().estimates(&store, 1.6).is_empty());
    }

    #[test]
    fn test_confirmed_ball_preferred_over_lost() {
        let mut store = TrackStore::new();
        insert_ball(&mut store, 0.0, 1.0, TrackStatus::Lost);
        let confirmed = insert_ball(&mut store, 500.0, 1.0, TrackStatus::Confirmed);

        let estimates = output().estimates(&store, 1.0);
        assert_eq!(estimates.len(), 1);
        assert_eq!(estimates[0].track_id, confirmed);
    }

    #[test]
    fn test_emission_order_by_class() {
        let mut store = TrackStore::new();
        let blue2 = insert_robot(&mut store, TeamColor::Blue, 2, TrackStatus::Confirmed);
        let yellow5 = insert_robot(&mut store, TeamColor::Yellow, 5, TrackStatus::Confirmed);
        let blue0 = insert_robot(&mut store, TeamColor::Blue, 0, TrackStatus::Confirmed);
        insert_robot(&mut store, TeamColor::Yellow, 1, TrackStatus::Lost);
        let ball = insert_ball(&mut store, 0.0, 0.0, TrackStatus::Confirmed);

        let ids: Vec<TrackId> = output().estimates(&store, 0.0).iter().map(|e| e.track_id).collect();
        assert_eq!(ids, vec![ball, yellow5, blue0, blue2]);

        let tick = OutputTick {
            sequence: 0,
            t: 0.0,
            estimates: output().estimates(&store, 0.0),
        };
        assert_eq!(tick.ball().map(|b| b.track_id), Some(ball));
        assert!(tick.robots().all(|r| r.orientation.is_some()));
    }

    #[test]
    fn test_publisher_drops_unread() {
        let publisher = TickPublisher::new();
        let reader = publisher.clone();
        let tick = |sequence| OutputTick {
            sequence,
            t: sequence as f64,
            estimates: vec![],
        };

        assert!(!publisher.publish(tick(0)));
        assert!(publisher.publish(tick(1)));
        assert_eq!(reader.take().map(|t| t.sequence), Some(1));
        assert!(reader.take().is_none());
        assert!(!publisher.publish(tick(2)));

        assert_eq!(publisher.published(), 3);
        assert_eq!(publisher.dropped(), 1);
    }

    #[test]
    fn test_estimate_serializes() {
        let mut store = TrackStore::new();
        insert_ball(&mut store, 10.0, 0.0, TrackStatus::Confirmed);
        let estimates = output().estimates(&store, 0.0);
        let json = serde_json::to_string(&estimates[0]).unwrap();
        assert!(json.contains("\"kind\":\"ball\""));
        assert!(!json.contains("orientation"));
    }
}
