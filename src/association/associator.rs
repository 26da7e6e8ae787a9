//! Per-frame detection-to-track association
//!
//! For one [`DetectionFrame`] the [`Associator`]:
//!
//! 1. Screens detections (confidence, field bounds) and records rejections.
//! 2. Groups tracks and detections by [`ObjectClass`]; cross-class pairs are
//!    never considered.
//! 3. Predicts every candidate track to the frame's capture time.
//! 4. Builds a gated cost matrix per class and solves it with the Hungarian
//!    algorithm, rows ordered by ascending track id.
//! 5. Drops solved pairs that another assignment of equal total cost avoids.
//!
//! The associator only reads the [`TrackStore`]. Applying the outcome is the
//! [`TrackManager`](crate::manager::TrackManager)'s job.

use std::collections::{BTreeMap, BTreeSet};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use super::gating::{equal_cost_alternative, gate_for, gated_cost_matrix, screen_detection, RejectReason};
use crate::common::association::hungarian::hungarian;
use crate::config::AssociationConfig;
use crate::geometry::FieldGeometry;
use crate::motion::{GaussianState, ModelSet, PredictedMeasurement};
use crate::track::{Track, TrackStore};
use crate::types::{Detection, DetectionFrame, ObjectClass, TrackId};

/// An accepted detection-to-track assignment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub track_id: TrackId,
    /// Index into [`AssociationOutcome::detections`]
    pub detection: usize,
    /// Squared Mahalanobis distance
    pub cost: f64,
    /// The detection is older than the track's last update
    pub stale: bool,
}

/// A detection discarded before gating
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rejection {
    pub detection: usize,
    pub reason: RejectReason,
}

/// Result of associating one frame against the track store
#[derive(Debug, Clone, Default)]
pub struct AssociationOutcome {
    /// All detections of the frame, in frame order
    pub detections: Vec<Detection>,
    /// Predicted states at the frame's capture time, for candidate tracks
    pub predictions: BTreeMap<TrackId, GaussianState>,
    pub matches: Vec<Match>,
    /// Detections with no gated track, candidates for new tracks
    pub unmatched_detections: Vec<usize>,
    /// Tracks with no match and no ambiguity, candidates for a miss
    pub unmatched_tracks: Vec<TrackId>,
    /// Tracks left unassigned because of a tie
    pub ambiguous_tracks: Vec<TrackId>,
    /// Detections left unassigned because of a tie
    pub ambiguous_detections: Vec<usize>,
    pub rejected: Vec<Rejection>,
}

impl AssociationOutcome {
    /// The match for a track, if any
    pub fn match_for(&self, track_id: TrackId) -> Option<&Match> {
        self.matches.iter().find(|m| m.track_id == track_id)
    }

    /// Number of detections that reached gating
    pub fn num_screened(&self) -> usize {
        self.detections.len() - self.rejected.len()
    }
}

/// Candidate tracks and detections for one class
#[derive(Default)]
struct ClassGroup<'a> {
    tracks: Vec<&'a Track>,
    detections: Vec<usize>,
}

/// Gated global-nearest-neighbour associator
#[derive(Debug, Clone)]
pub struct Associator {
    models: ModelSet,
    config: AssociationConfig,
    geometry: FieldGeometry,
}

impl Associator {
    pub fn new(models: ModelSet, config: AssociationConfig, geometry: FieldGeometry) -> Self {
        Self {
            models,
            config,
            geometry,
        }
    }

    pub fn models(&self) -> &ModelSet {
        &self.models
    }

    pub fn config(&self) -> &AssociationConfig {
        &self.config
    }

    pub fn geometry(&self) -> &FieldGeometry {
        &self.geometry
    }

    /// Associate one frame's detections with the live tracks in `store`.
    pub fn associate(&self, store: &TrackStore, frame: &DetectionFrame) -> AssociationOutcome {
        let mut outcome = AssociationOutcome {
            detections: frame.detections(),
            ..Default::default()
        };
        let t = frame.t_capture;

        // Screening
        let mut groups: BTreeMap<ObjectClass, ClassGroup<'_>> = BTreeMap::new();
        for (j, detection) in outcome.detections.iter().enumerate() {
            match screen_detection(detection, &self.geometry, &self.config) {
                Some(reason) => outcome.rejected.push(Rejection {
                    detection: j,
                    reason,
                }),
                None => groups.entry(detection.class).or_default().detections.push(j),
            }
        }

        // Candidate tracks, ascending id since the store iterates in id order
        let mut uninvolved = Vec::new();
        for track in store.iter() {
            match groups.get_mut(&track.class) {
                Some(group) => group.tracks.push(track),
                None => uninvolved.push(track.id),
            }
        }

        let candidates: Vec<&Track> = groups.values().flat_map(|g| g.tracks.iter().copied()).collect();
        outcome.predictions = self.predict_all(&candidates, t);

        for (class, group) in &groups {
            self.solve_group(class, group, &mut outcome);
        }

        outcome.unmatched_tracks.extend(uninvolved);
        outcome.unmatched_tracks.sort();
        outcome.unmatched_detections.sort_unstable();
        outcome.ambiguous_detections.sort_unstable();

        log::trace!(
            "cam {} frame {}: {} detections, {} matched, {} new, {} rejected, {} ambiguous",
            frame.camera_id,
            frame.frame_number,
            outcome.detections.len(),
            outcome.matches.len(),
            outcome.unmatched_detections.len(),
            outcome.rejected.len(),
            outcome.ambiguous_tracks.len(),
        );
        outcome
    }

    /// Predict each candidate track to time `t`.
    ///
    /// Tracks updated after `t` are predicted with `dt = 0`.
    fn predict_all(&self, tracks: &[&Track], t: f64) -> BTreeMap<TrackId, GaussianState> {
        let predict = |track: &&Track| {
            let model = self.models.for_class(&track.class);
            (track.id, model.predict(&track.state, t - track.last_update))
        };

        #[cfg(feature = "rayon")]
        {
            tracks.par_iter().map(predict).collect::<Vec<_>>().into_iter().collect()
        }

        #[cfg(not(feature = "rayon"))]
        {
            tracks.iter().map(predict).collect()
        }
    }

    fn solve_group(&self, class: &ObjectClass, group: &ClassGroup<'_>, outcome: &mut AssociationOutcome) {
        if group.tracks.is_empty() {
            outcome.unmatched_detections.extend(&group.detections);
            return;
        }

        let model = self.models.for_class(class);
        let predicted: Vec<PredictedMeasurement> = group
            .tracks
            .iter()
            .filter_map(|track| outcome.predictions.get(&track.id))
            .map(|state| model.predict_measurement(state))
            .collect();
        let predicted_refs: Vec<&PredictedMeasurement> = predicted.iter().collect();
        let detection_refs: Vec<&Detection> = group.detections.iter().map(|&j| &outcome.detections[j]).collect();

        let cost = gated_cost_matrix(model, &predicted_refs, &detection_refs, gate_for(class, &self.config));
        let solution = hungarian(&cost);

        let tolerance = self.config.ambiguity_tolerance;
        let mut assigned_cols = BTreeSet::new();
        let mut ambiguous_cols = BTreeSet::new();
        for (row, track) in group.tracks.iter().enumerate() {
            let Some(col) = solution.row_to_col[row] else {
                outcome.unmatched_tracks.push(track.id);
                continue;
            };
            if let Some(alternative) = equal_cost_alternative(&cost, &solution, row, col, tolerance) {
                log::debug!(
                    "{} ambiguous between assignments at equal cost {:.3}",
                    track.id,
                    solution.cost
                );
                outcome.ambiguous_tracks.push(track.id);
                ambiguous_cols.insert(col);
                // Detections the equally good assignment would use instead
                ambiguous_cols.extend(alternative.row_to_col.iter().flatten().copied());
                continue;
            }
            assigned_cols.insert(col);
            let detection = group.detections[col];
            outcome.matches.push(Match {
                track_id: track.id,
                detection,
                cost: cost[(row, col)],
                stale: outcome.detections[detection].t_capture < track.last_update,
            });
        }

        for (col, &detection) in group.detections.iter().enumerate() {
            if assigned_cols.contains(&col) {
                continue;
            }
            if ambiguous_cols.contains(&col) {
                outcome.ambiguous_detections.push(detection);
            } else {
                outcome.unmatched_detections.push(detection);
            }
        }
    }
}
