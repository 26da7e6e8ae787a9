/*!
# vision-filter-rs - Multi-camera ball and robot tracking

Fuses per-camera SSL vision detection frames into one stable estimate per
physical object: a single ball and one track per robot.

## Features

- Multi-producer reorder buffer releasing frames in capture-time order
- Friction-aware ball model and constant-velocity robot model
- Mahalanobis-gated global nearest neighbour association (Hungarian)
- Track lifecycle (Tentative, Confirmed, Lost, Deleted) with cross-camera merging
- Latest-value output publishing that never blocks the tracker

## Modules

- [`ingest`] - Reorder buffer and producer handles
- [`motion`] - Motion and measurement models
- [`association`] - Detection screening, gating and assignment
- [`manager`] - Track lifecycle and merging
- [`output`] - Fused estimates and tick publishing
- [`pipeline`] - The [`VisionFilter`] tying the stages together
- [`common`] - Low-level utilities

## Example

```rust
use vision_filter_rs::{DetectionFrame, FieldGeometry, ReferenceData, TrackerConfig, VisionFilter};

let reference = ReferenceData::new(FieldGeometry::division_b(), vec![]);
let mut filter = VisionFilter::new(TrackerConfig::default(), &reference).unwrap();

let frames = (0..10).map(|k| DetectionFrame::new(0, k, k as f64 / 62.5).with_ball(120.0, -40.0));
filter.process_frames(frames);

let tick = filter.tick(9.0 / 62.5);
assert!(tick.ball().is_some());
```
*/

// ============================================================================
// Core modules
// ============================================================================

/// Frame, sighting and identity types
pub mod types;

/// Error types
pub mod errors;

/// Tracker configuration
pub mod config;

/// Field geometry and camera calibration reference data
pub mod geometry;

/// Motion and measurement models
pub mod motion;

/// Tracks and the track store
pub mod track;

/// Data association
pub mod association;

/// Track lifecycle management
pub mod manager;

/// Frame ingestion and reordering
pub mod ingest;

/// Fused output and tick publishing
pub mod output;

/// Events, reporters and diagnostics
pub mod reporter;

/// The end-to-end pipeline
pub mod pipeline;

/// Low-level utilities (assignment, linear algebra, scenario generation)
pub mod common;

/// Benchmark utilities (scenario presets, frame loading)
pub mod bench_utils;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// Core types
pub use types::{BallSighting, CameraId, Detection, DetectionFrame, ObjectClass, RobotSighting, TeamColor, TrackId};

// Errors
pub use errors::{ConfigurationError, FilterError, Result};

// Configuration and reference data
pub use config::{
    AssociationConfig, BallModelConfig, FusionConfig, IngestConfig, LifecycleConfig, RobotModelConfig, RobotNoise,
    TrackerConfig,
};
pub use geometry::{CameraCalibration, FieldGeometry, ReferenceData};

// Stages
pub use association::{AssociationOutcome, Associator};
pub use ingest::{FrameIngest, FrameProducer, IngestStats};
pub use manager::TrackManager;
pub use motion::{BallModel, GaussianState, ModelSet, MotionModel, RobotModel};
pub use output::{FusedEstimate, FusionOutput, OutputTick, TickPublisher};
pub use pipeline::VisionFilter;
pub use track::{Track, TrackStatus, TrackStore};

// Observability
pub use reporter::{
    CompositeReporter, DebugReporter, Diagnostics, LoggingReporter, NoOpReporter, PipelineEvent, StepReporter,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
