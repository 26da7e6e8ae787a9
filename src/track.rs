//! Tracks and the track store
//!
//! [`TrackStore`] is the single owner of every [`Track`]. Its mutating methods
//! are crate-private and only called by the
//! [`TrackManager`](crate::manager::TrackManager); everything else reads.

use std::collections::{BTreeMap, HashMap};

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::motion::GaussianState;
use crate::types::{CameraId, ObjectClass, TeamColor, TrackId};

/// Track lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackStatus {
    Tentative,
    Confirmed,
    Lost,
    /// Removed from the store; carried by the track value handed back on removal
    Deleted,
}

/// A camera that recently contributed a measurement to a track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observer {
    pub camera_id: CameraId,
    /// Capture time of the camera's latest contribution
    pub last_seen: f64,
}

/// The persistent belief about one physical object
#[derive(Debug, Clone)]
pub struct Track {
    /// Unique track identifier
    pub id: TrackId,
    pub class: ObjectClass,
    /// Current state estimate, valid at `last_update`
    pub state: GaussianState,
    pub status: TrackStatus,
    /// Consecutive hits
    pub hits: u32,
    /// Consecutive misses
    pub misses: u32,
    /// Capture time of the last successful update
    pub last_update: f64,
    pub created_at: f64,
    /// Most recent measurement applied, kept for covariance resets
    pub last_measurement: DVector<f64>,
    /// Cameras that updated this track in the current cycle
    pub cycle_cameras: SmallVec<[CameraId; 4]>,
    /// Cameras that updated this track recently (bounded, expiring)
    pub observers: SmallVec<[Observer; 4]>,
    /// Total successful updates over the track's life
    pub total_updates: u64,
}

impl Track {
    /// Create a new tentative track
    pub fn new(
        id: TrackId,
        class: ObjectClass,
        state: GaussianState,
        measurement: DVector<f64>,
        camera_id: CameraId,
        t: f64,
    ) -> Self {
        let mut track = Self {
            id,
            class,
            state,
            status: TrackStatus::Tentative,
            hits: 1,
            misses: 0,
            last_update: t,
            created_at: t,
            last_measurement: measurement,
            cycle_cameras: SmallVec::new(),
            observers: SmallVec::new(),
            total_updates: 1,
        };
        track.note_contribution(camera_id, t);
        track
    }

    #[inline]
    pub fn mean(&self) -> &DVector<f64> {
        &self.state.mean
    }

    #[inline]
    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.state.covariance
    }

    /// Record that `camera_id` contributed a measurement at time `t`
    pub fn note_contribution(&mut self, camera_id: CameraId, t: f64) {
        if !self.cycle_cameras.contains(&camera_id) {
            self.cycle_cameras.push(camera_id);
        }
        self.note_observer(Observer {
            camera_id,
            last_seen: t,
        });
    }

    /// Add or refresh an observer, keeping the later sighting
    pub fn note_observer(&mut self, observer: Observer) {
        match self.observers.iter_mut().find(|o| o.camera_id == observer.camera_id) {
            Some(existing) => existing.last_seen = existing.last_seen.max(observer.last_seen),
            None => self.observers.push(observer),
        }
    }

    /// Drop observers whose last contribution is older than `timeout` at time `now`
    pub fn expire_observers(&mut self, now: f64, timeout: f64) {
        self.observers.retain(|o| now - o.last_seen <= timeout);
    }

    /// Whether a frame from `camera_id` should count as a missed opportunity.
    ///
    /// True if the camera is a current observer, or if nobody observes the
    /// track any more.
    pub fn expects_camera(&self, camera_id: CameraId) -> bool {
        self.observers.is_empty() || self.observers.iter().any(|o| o.camera_id == camera_id)
    }

    /// Robot key, if this is a robot track
    pub fn robot_key(&self) -> Option<(TeamColor, u32)> {
        match self.class {
            ObjectClass::Robot { team, id } => Some((team, id)),
            ObjectClass::Ball => None,
        }
    }
}

/// Owner of all live tracks, keyed by track id.
///
/// Track ids are allocated monotonically and never reused. Robot tracks are
/// additionally indexed by `(team, id)`; at most one live track exists per key.
#[derive(Debug, Clone, Default)]
pub struct TrackStore {
    tracks: BTreeMap<TrackId, Track>,
    robot_index: HashMap<(TeamColor, u32), TrackId>,
    next_id: u64,
}

impl TrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live tracks
    #[inline]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(&id)
    }

    /// Iterate tracks in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    /// Ball tracks in ascending id order
    pub fn ball_tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values().filter(|t| t.class.is_ball())
    }

    /// The live track for a robot, if any
    pub fn robot_track(&self, team: TeamColor, id: u32) -> Option<&Track> {
        self.robot_index
            .get(&(team, id))
            .and_then(|tid| self.tracks.get(tid))
    }

    /// Count of tracks with a given status
    pub fn count_status(&self, status: TrackStatus) -> usize {
        self.tracks.values().filter(|t| t.status == status).count()
    }

    pub(crate) fn get_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.get_mut(&id)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Track> {
        self.tracks.values_mut()
    }

    /// Allocate an id and insert a new tentative track.
    ///
    /// Replaces any robot index entry for the same key; callers remove the
    /// previous robot track first.
    pub(crate) fn insert(
        &mut self,
        class: ObjectClass,
        state: GaussianState,
        measurement: DVector<f64>,
        camera_id: CameraId,
        t: f64,
    ) -> TrackId {
        let id = TrackId(self.next_id);
        self.next_id += 1;
        if let ObjectClass::Robot { team, id: robot_id } = class {
            self.robot_index.insert((team, robot_id), id);
        }
        self.tracks
            .insert(id, Track::new(id, class, state, measurement, camera_id, t));
        id
    }

    /// Remove a track permanently, returning it marked [`TrackStatus::Deleted`]
    pub(crate) fn remove(&mut self, id: TrackId) -> Option<Track> {
        let mut track = self.tracks.remove(&id)?;
        track.status = TrackStatus::Deleted;
        if let Some(key) = track.robot_key() {
            if self.robot_index.get(&key) == Some(&id) {
                self.robot_index.remove(&key);
            }
        }
        Some(track)
    }

    /// Remove all tracks (new session). Ids keep increasing.
    pub(crate) fn clear(&mut self) {
        self.tracks.clear();
        self.robot_index.clear();
    }
}
