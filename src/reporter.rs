//! Observability for pipeline execution.
//!
//! Non-fatal conditions (late frames, rejected detections, ambiguous
//! associations, covariance resets) and track lifecycle transitions are
//! reported as [`PipelineEvent`]s rather than errors. The pipeline forwards
//! every event to a [`StepReporter`] and tallies it in [`Diagnostics`].
//!
//! # Zero-Cost Abstraction
//!
//! The default [`NoOpReporter`] compiles to zero overhead - all callback
//! methods are empty and will be optimized away by the compiler.
//!
//! # Example
//!
//! ```
//! use vision_filter_rs::reporter::{DebugReporter, PipelineEvent, StepReporter};
//! use vision_filter_rs::types::{ObjectClass, TrackId};
//!
//! let mut reporter = DebugReporter::new();
//! reporter.on_event(&PipelineEvent::TrackCreated {
//!     track_id: TrackId(0),
//!     class: ObjectClass::Ball,
//!     camera_id: 1,
//!     t: 0.0,
//! });
//! assert_eq!(reporter.events().len(), 1);
//! ```

use std::fmt;

use serde::Serialize;

use crate::association::{AssociationOutcome, RejectReason};
use crate::output::OutputTick;
use crate::types::{CameraId, DetectionFrame, ObjectClass, TrackId};

// ============================================================================
// Events
// ============================================================================

/// Why a track was removed from the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteReason {
    /// Tentative track missed before confirmation
    TentativeMiss,
    /// Lost for longer than the deletion threshold
    MissTimeout,
    /// Lost ball replaced by a newly confirmed ball
    Superseded,
}

/// Why a track was reset to tentative
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetCause {
    /// Update produced a covariance that failed the PSD check
    NumericalInstability(String),
    /// Lost robot seen again outside its gate
    Reacquired,
}

/// A non-fatal condition or lifecycle transition
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    LateFrameDropped {
        camera_id: CameraId,
        frame_number: u64,
        t_capture: f64,
        /// Capture time of the last released frame
        released_until: f64,
    },
    DuplicateFrameDropped {
        camera_id: CameraId,
        frame_number: u64,
    },
    DetectionRejected {
        camera_id: CameraId,
        class: ObjectClass,
        reason: RejectReason,
        x: f64,
        y: f64,
    },
    TrackCreated {
        track_id: TrackId,
        class: ObjectClass,
        camera_id: CameraId,
        t: f64,
    },
    TrackConfirmed {
        track_id: TrackId,
        class: ObjectClass,
        t: f64,
    },
    TrackLost {
        track_id: TrackId,
        class: ObjectClass,
        t: f64,
    },
    /// Lost track matched again
    TrackRecovered {
        track_id: TrackId,
        class: ObjectClass,
        t: f64,
    },
    TrackDeleted {
        track_id: TrackId,
        class: ObjectClass,
        reason: DeleteReason,
        t: f64,
    },
    TrackReset {
        track_id: TrackId,
        class: ObjectClass,
        cause: ResetCause,
        t: f64,
    },
    TracksMerged {
        survivor: TrackId,
        absorbed: TrackId,
        class: ObjectClass,
        distance: f64,
        t: f64,
    },
    AmbiguousAssociation {
        camera_id: CameraId,
        tracks: Vec<TrackId>,
        detections: usize,
        t: f64,
    },
    /// Robot detection outside the gate of the live track with its key
    RobotOutlier {
        camera_id: CameraId,
        track_id: TrackId,
        class: ObjectClass,
        t: f64,
    },
    /// Detection older than the matched track's last update
    StaleDetection {
        camera_id: CameraId,
        track_id: TrackId,
        t_capture: f64,
        last_update: f64,
    },
}

impl PipelineEvent {
    /// Whether this is a track lifecycle transition
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            PipelineEvent::TrackCreated { .. }
                | PipelineEvent::TrackConfirmed { .. }
                | PipelineEvent::TrackLost { .. }
                | PipelineEvent::TrackRecovered { .. }
                | PipelineEvent::TrackDeleted { .. }
                | PipelineEvent::TrackReset { .. }
                | PipelineEvent::TracksMerged { .. }
        )
    }
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use PipelineEvent::*;
        match self {
            LateFrameDropped {
                camera_id,
                frame_number,
                t_capture,
                released_until,
            } => write!(
                f,
                "late frame dropped: cam {} frame {} at {:.4}s, released until {:.4}s",
                camera_id, frame_number, t_capture, released_until
            ),
            DuplicateFrameDropped {
                camera_id,
                frame_number,
            } => write!(f, "duplicate frame dropped: cam {} frame {}", camera_id, frame_number),
            DetectionRejected {
                camera_id,
                class,
                reason,
                x,
                y,
            } => write!(
                f,
                "{} detection from cam {} rejected ({:?}) at ({:.0}, {:.0})",
                class, camera_id, reason, x, y
            ),
            TrackCreated {
                track_id,
                class,
                camera_id,
                t,
            } => write!(f, "{} created for {} from cam {} at {:.4}s", track_id, class, camera_id, t),
            TrackConfirmed { track_id, class, t } => {
                write!(f, "{} ({}) confirmed at {:.4}s", track_id, class, t)
            }
            TrackLost { track_id, class, t } => write!(f, "{} ({}) lost at {:.4}s", track_id, class, t),
            TrackRecovered { track_id, class, t } => {
                write!(f, "{} ({}) recovered at {:.4}s", track_id, class, t)
            }
            TrackDeleted {
                track_id,
                class,
                reason,
                t,
            } => write!(f, "{} ({}) deleted ({:?}) at {:.4}s", track_id, class, reason, t),
            TrackReset {
                track_id,
                class,
                cause,
                t,
            } => write!(f, "{} ({}) reset ({:?}) at {:.4}s", track_id, class, cause, t),
            TracksMerged {
                survivor,
                absorbed,
                class,
                distance,
                t,
            } => write!(
                f,
                "{} merged into {} ({}, d²={:.3}) at {:.4}s",
                absorbed, survivor, class, distance, t
            ),
            AmbiguousAssociation {
                camera_id,
                tracks,
                detections,
                t,
            } => write!(
                f,
                "ambiguous association on cam {} at {:.4}s: {} tracks, {} detections",
                camera_id,
                t,
                tracks.len(),
                detections
            ),
            RobotOutlier {
                camera_id,
                track_id,
                class,
                t,
            } => write!(
                f,
                "{} detection from cam {} outside gate of {} at {:.4}s",
                class, camera_id, track_id, t
            ),
            StaleDetection {
                camera_id,
                track_id,
                t_capture,
                last_update,
            } => write!(
                f,
                "stale detection for {} from cam {}: {:.4}s < {:.4}s",
                track_id, camera_id, t_capture, last_update
            ),
        }
    }
}

// ============================================================================
// StepReporter Trait
// ============================================================================

/// Observability trait for pipeline execution.
///
/// All methods have default empty implementations, so you only need
/// to override the events you care about.
///
/// Reporters use `&mut self` for callbacks and are driven from the single
/// consumer thread, so they are not required to be `Send + Sync`.
pub trait StepReporter {
    /// Called for every non-fatal condition and lifecycle transition
    fn on_event(&mut self, _event: &PipelineEvent) {}

    /// Called after a frame has been associated, before it is applied
    fn on_association(&mut self, _frame: &DetectionFrame, _outcome: &AssociationOutcome) {}

    /// Called after a cycle has been committed to the track store
    fn on_cycle_complete(&mut self, _t: f64, _num_frames: usize, _num_tracks: usize) {}

    /// Called when an output tick is produced
    fn on_tick(&mut self, _tick: &OutputTick) {}
}

impl<R: StepReporter + ?Sized> StepReporter for Box<R> {
    fn on_event(&mut self, event: &PipelineEvent) {
        (**self).on_event(event)
    }

    fn on_association(&mut self, frame: &DetectionFrame, outcome: &AssociationOutcome) {
        (**self).on_association(frame, outcome)
    }

    fn on_cycle_complete(&mut self, t: f64, num_frames: usize, num_tracks: usize) {
        (**self).on_cycle_complete(t, num_frames, num_tracks)
    }

    fn on_tick(&mut self, tick: &OutputTick) {
        (**self).on_tick(tick)
    }
}

// ============================================================================
// NoOpReporter
// ============================================================================

/// Zero-cost reporter that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpReporter;

impl NoOpReporter {
    pub fn new() -> Self {
        Self
    }
}

impl StepReporter for NoOpReporter {}

// ============================================================================
// DebugReporter
// ============================================================================

/// Reporter that captures all events for debugging and tests.
///
/// Stores a clone of every event and tick, so memory grows with run length.
#[derive(Debug, Clone, Default)]
pub struct DebugReporter {
    events: Vec<PipelineEvent>,
    /// (camera, frame number, matches, unmatched detections)
    associations: Vec<(CameraId, u64, usize, usize)>,
    cycles: Vec<(f64, usize, usize)>,
    ticks: Vec<OutputTick>,
}

impl DebugReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all captured events.
    pub fn clear(&mut self) {
        self.events.clear();
        self.associations.clear();
        self.cycles.clear();
        self.ticks.clear();
    }

    pub fn events(&self) -> &[PipelineEvent] {
        &self.events
    }

    /// Events matching a predicate
    pub fn events_where<F>(&self, predicate: F) -> Vec<&PipelineEvent>
    where
        F: Fn(&PipelineEvent) -> bool,
    {
        self.events.iter().filter(|e| predicate(e)).collect()
    }

    pub fn associations(&self) -> &[(CameraId, u64, usize, usize)] {
        &self.associations
    }

    /// Captured cycles as (time, frames, tracks)
    pub fn cycles(&self) -> &[(f64, usize, usize)] {
        &self.cycles
    }

    pub fn ticks(&self) -> &[OutputTick] {
        &self.ticks
    }
}

impl StepReporter for DebugReporter {
    fn on_event(&mut self, event: &PipelineEvent) {
        self.events.push(event.clone());
    }

    fn on_association(&mut self, frame: &DetectionFrame, outcome: &AssociationOutcome) {
        self.associations.push((
            frame.camera_id,
            frame.frame_number,
            outcome.matches.len(),
            outcome.unmatched_detections.len(),
        ));
    }

    fn on_cycle_complete(&mut self, t: f64, num_frames: usize, num_tracks: usize) {
        self.cycles.push((t, num_frames, num_tracks));
    }

    fn on_tick(&mut self, tick: &OutputTick) {
        self.ticks.push(tick.clone());
    }
}

// ============================================================================
// LoggingReporter
// ============================================================================

/// Reporter that logs events using the log crate.
///
/// # Log Levels
///
/// - lifecycle transitions: INFO
/// - covariance resets: WARN
/// - dropped frames, rejections, ambiguity, outliers: DEBUG
/// - association results, cycles, ticks: TRACE
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingReporter {
    /// Whether to log per-frame association results
    verbose: bool,
}

impl LoggingReporter {
    pub fn new() -> Self {
        Self { verbose: false }
    }

    /// Also log every association result at TRACE
    pub fn verbose() -> Self {
        Self { verbose: true }
    }
}

impl StepReporter for LoggingReporter {
    fn on_event(&mut self, event: &PipelineEvent) {
        match event {
            PipelineEvent::TrackReset { .. } => log::warn!("{}", event),
            e if e.is_lifecycle() => log::info!("{}", event),
            _ => log::debug!("{}", event),
        }
    }

    fn on_association(&mut self, frame: &DetectionFrame, outcome: &AssociationOutcome) {
        if self.verbose {
            log::trace!(
                "cam {} frame {} ({:.4}s): {} matched, {} unmatched, {} misses",
                frame.camera_id,
                frame.frame_number,
                frame.t_capture,
                outcome.matches.len(),
                outcome.unmatched_detections.len(),
                outcome.unmatched_tracks.len()
            );
        }
    }

    fn on_cycle_complete(&mut self, t: f64, num_frames: usize, num_tracks: usize) {
        log::trace!("cycle at {:.4}s: {} frames, {} tracks", t, num_frames, num_tracks);
    }

    fn on_tick(&mut self, tick: &OutputTick) {
        log::trace!("tick at {:.4}s: {} estimates", tick.t, tick.estimates.len());
    }
}

// ============================================================================
// CompositeReporter
// ============================================================================

/// Reporter that forwards events to two child reporters.
#[derive(Debug, Clone)]
pub struct CompositeReporter<A: StepReporter, B: StepReporter> {
    first: A,
    second: B,
}

impl<A: StepReporter, B: StepReporter> CompositeReporter<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }

    pub fn first(&self) -> &A {
        &self.first
    }

    pub fn first_mut(&mut self) -> &mut A {
        &mut self.first
    }

    pub fn second(&self) -> &B {
        &self.second
    }

    pub fn second_mut(&mut self) -> &mut B {
        &mut self.second
    }

    /// Consume and return both reporters.
    pub fn into_parts(self) -> (A, B) {
        (self.first, self.second)
    }
}

impl<A: StepReporter, B: StepReporter> StepReporter for CompositeReporter<A, B> {
    fn on_event(&mut self, event: &PipelineEvent) {
        self.first.on_event(event);
        self.second.on_event(event);
    }

    fn on_association(&mut self, frame: &DetectionFrame, outcome: &AssociationOutcome) {
        self.first.on_association(frame, outcome);
        self.second.on_association(frame, outcome);
    }

    fn on_cycle_complete(&mut self, t: f64, num_frames: usize, num_tracks: usize) {
        self.first.on_cycle_complete(t, num_frames, num_tracks);
        self.second.on_cycle_complete(t, num_frames, num_tracks);
    }

    fn on_tick(&mut self, tick: &OutputTick) {
        self.first.on_tick(tick);
        self.second.on_tick(tick);
    }
}

// ============================================================================
// Diagnostics
// ============================================================================

/// Running counters of pipeline activity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub frames_processed: u64,
    pub cycles: u64,
    pub detections: u64,
    pub late_frames: u64,
    pub duplicate_frames: u64,
    pub out_of_bounds: u64,
    pub low_confidence: u64,
    pub non_finite: u64,
    /// Frames dropped for a non-finite capture time
    pub invalid_frames: u64,
    pub ambiguous: u64,
    pub robot_outliers: u64,
    pub stale_detections: u64,
    pub tracks_created: u64,
    pub tracks_confirmed: u64,
    pub tracks_lost: u64,
    pub tracks_deleted: u64,
    pub resets: u64,
    pub merges: u64,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one event
    pub fn record(&mut self, event: &PipelineEvent) {
        match event {
            PipelineEvent::LateFrameDropped { .. } => self.late_frames += 1,
            PipelineEvent::DuplicateFrameDropped { .. } => self.duplicate_frames += 1,
            PipelineEvent::DetectionRejected { reason, .. } => match reason {
                RejectReason::OutOfBounds => self.out_of_bounds += 1,
                RejectReason::LowConfidence => self.low_confidence += 1,
                RejectReason::NonFinite => self.non_finite += 1,
            },
            PipelineEvent::TrackCreated { .. } => self.tracks_created += 1,
            PipelineEvent::TrackConfirmed { .. } => self.tracks_confirmed += 1,
            PipelineEvent::TrackLost { .. } => self.tracks_lost += 1,
            PipelineEvent::TrackRecovered { .. } => {}
            PipelineEvent::TrackDeleted { .. } => self.tracks_deleted += 1,
            PipelineEvent::TrackReset { .. } => self.resets += 1,
            PipelineEvent::TracksMerged { .. } => self.merges += 1,
            PipelineEvent::AmbiguousAssociation { .. } => self.ambiguous += 1,
            PipelineEvent::RobotOutlier { .. } => self.robot_outliers += 1,
            PipelineEvent::StaleDetection { .. } => self.stale_detections += 1,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
