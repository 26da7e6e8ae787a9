//! Configuration types for the tracker
//!
//! This module provides decomposed configuration types, one per pipeline
//! stage, assembled into [`TrackerConfig`]. All types implement `Default`
//! with tuned values and round-trip through JSON.
//!
//! # Example
//!
//! ```
//! use vision_filter_rs::config::TrackerConfig;
//!
//! let config = TrackerConfig::default();
//! config.validate().unwrap();
//! println!("{}", config.to_json_pretty());
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigurationError;
use crate::types::TeamColor;

/// Standard gravity in mm/s²
pub const GRAVITY_MM: f64 = 9806.65;

/// Rolling friction coefficient of the ball on carpet
pub const BALL_FRICTION_COEFFICIENT: f64 = 0.07;

/// Reorder buffer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Maximum time (s) a frame is held waiting for other cameras
    pub max_delay: f64,
    /// A camera with no frame for this long (s, capture time) stops gating release
    pub camera_timeout: f64,
    /// Frames whose capture times lie within this window (s) form one cycle
    pub cycle_window: f64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_delay: 0.2,
            camera_timeout: 1.0,
            cycle_window: 1e-3,
        }
    }
}

/// Ball motion and measurement model parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BallModelConfig {
    /// Rolling friction deceleration (mm/s²)
    pub friction_decel: f64,
    /// Speeds (mm/s) below which no friction is applied on an axis
    pub friction_deadzone: f64,
    /// Piecewise white-noise acceleration variance ((mm/s²)²)
    pub process_variance: f64,
    /// Measurement variance per axis (mm²)
    pub measurement_variance: f64,
    /// Initial position variance of a new track (mm²)
    pub initial_position_variance: f64,
    /// Initial velocity variance of a new track ((mm/s)²)
    pub initial_velocity_variance: f64,
}

impl Default for BallModelConfig {
    fn default() -> Self {
        Self {
            friction_decel: BALL_FRICTION_COEFFICIENT * GRAVITY_MM,
            friction_deadzone: 1e-6,
            process_variance: 1.0e6,
            measurement_variance: 10.0,
            initial_position_variance: 10.0,
            initial_velocity_variance: 1.0e8,
        }
    }
}

/// Noise levels for one class of robots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotNoise {
    /// Position measurement variance (mm²)
    pub position_variance: f64,
    /// Velocity random-walk variance per second ((mm/s)²/s)
    pub velocity_variance: f64,
    /// Angular velocity random-walk variance per second ((rad/s)²/s)
    pub angular_velocity_variance: f64,
}

impl RobotNoise {
    /// Preset for robots whose commands we know (our own team)
    pub fn known() -> Self {
        Self {
            position_variance: 5.0_f64.powi(2),
            velocity_variance: 200.0_f64.powi(2),
            angular_velocity_variance: 70.0_f64.to_radians().powi(2),
        }
    }

    /// Preset for opponent robots
    pub fn unknown() -> Self {
        Self {
            position_variance: 10.0_f64.powi(2),
            velocity_variance: 50.0_f64.powi(2),
            angular_velocity_variance: 80.0_f64.to_radians().powi(2),
        }
    }
}

/// Robot motion and measurement model parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotModelConfig {
    /// Team whose robots use the `known` noise preset; all others use `unknown`
    pub known_team: Option<TeamColor>,
    pub known: RobotNoise,
    pub unknown: RobotNoise,
    /// Orientation measurement variance (rad²)
    pub orientation_variance: f64,
    /// Initial velocity variance of a new track ((mm/s)²)
    pub initial_velocity_variance: f64,
    /// Initial angular velocity variance of a new track ((rad/s)²)
    pub initial_angular_velocity_variance: f64,
}

impl Default for RobotModelConfig {
    fn default() -> Self {
        Self {
            known_team: None,
            known: RobotNoise::known(),
            unknown: RobotNoise::unknown(),
            orientation_variance: 0.5_f64.to_radians().powi(2),
            initial_velocity_variance: 1000.0_f64.powi(2),
            initial_angular_velocity_variance: 10.0_f64.powi(2),
        }
    }
}

/// Gating and assignment parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssociationConfig {
    /// Squared Mahalanobis gate for ball pairs (χ² 99.9%, 2 DoF)
    pub ball_gate: f64,
    /// Squared Mahalanobis gate for robot pairs (χ² 99.9%, 3 DoF)
    pub robot_gate: f64,
    /// Sightings below this confidence are discarded
    pub confidence_threshold: f64,
    /// Extra margin (mm) beyond the field boundary still considered plausible
    pub field_margin: f64,
    /// Relative tolerance under which two costs are considered tied
    pub ambiguity_tolerance: f64,
}

impl Default for AssociationConfig {
    fn default() -> Self {
        Self {
            ball_gate: 13.8,
            robot_gate: 16.3,
            confidence_threshold: 0.1,
            field_margin: 300.0,
            ambiguity_tolerance: 1e-9,
        }
    }
}

/// Track lifecycle and merge policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Consecutive hits that promote Tentative to Confirmed
    pub confirm_hits: u32,
    /// Consecutive misses beyond which Confirmed becomes Lost
    pub lost_after_misses: u32,
    /// Time (s) without update after which a Lost ball track is deleted
    pub ball_delete_after: f64,
    /// Time (s) without update after which a Lost robot track is deleted
    pub robot_delete_after: f64,
    /// Time (s) after which a camera stops counting as observing a track
    pub observer_timeout: f64,
    /// Squared Mahalanobis gate for cross-camera merges
    pub merge_gate: f64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            confirm_hits: 3,
            lost_after_misses: 10,
            ball_delete_after: 1.0,
            robot_delete_after: 10.0,
            observer_timeout: 0.5,
            merge_gate: 9.21,
        }
    }
}

/// Output policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// A Lost ball track is still emitted for this long (s) after its last update
    pub ball_grace: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self { ball_grace: 0.5 }
    }
}

/// Complete tracker configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub ingest: IngestConfig,
    pub ball: BallModelConfig,
    pub robot: RobotModelConfig,
    pub association: AssociationConfig,
    pub lifecycle: LifecycleConfig,
    pub fusion: FusionConfig,
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigurationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidParameter {
            name,
            description: format!("must be positive and finite, got {}", value),
        })
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<(), ConfigurationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidParameter {
            name,
            description: format!("must be non-negative and finite, got {}", value),
        })
    }
}

impl TrackerConfig {
    /// Parse from a JSON string and validate
    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file and validate
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Serialize to pretty-printed JSON string.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Check every parameter is in range.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        positive("ingest.max_delay", self.ingest.max_delay)?;
        positive("ingest.camera_timeout", self.ingest.camera_timeout)?;
        non_negative("ingest.cycle_window", self.ingest.cycle_window)?;

        non_negative("ball.friction_decel", self.ball.friction_decel)?;
        non_negative("ball.friction_deadzone", self.ball.friction_deadzone)?;
        non_negative("ball.process_variance", self.ball.process_variance)?;
        positive("ball.measurement_variance", self.ball.measurement_variance)?;
        positive("ball.initial_position_variance", self.ball.initial_position_variance)?;
        positive("ball.initial_velocity_variance", self.ball.initial_velocity_variance)?;

        for noise in [&self.robot.known, &self.robot.unknown] {
            positive("robot.position_variance", noise.position_variance)?;
            non_negative("robot.velocity_variance", noise.velocity_variance)?;
            non_negative("robot.angular_velocity_variance", noise.angular_velocity_variance)?;
        }
        positive("robot.orientation_variance", self.robot.orientation_variance)?;
        positive("robot.initial_velocity_variance", self.robot.initial_velocity_variance)?;
        positive(
            "robot.initial_angular_velocity_variance",
            self.robot.initial_angular_velocity_variance,
        )?;

        positive("association.ball_gate", self.association.ball_gate)?;
        positive("association.robot_gate", self.association.robot_gate)?;
        non_negative("association.field_margin", self.association.field_margin)?;
        non_negative("association.ambiguity_tolerance", self.association.ambiguity_tolerance)?;
        if !(0.0..=1.0).contains(&self.association.confidence_threshold) {
            return Err(ConfigurationError::InvalidParameter {
                name: "association.confidence_threshold",
                description: format!(
                    "must lie in [0, 1], got {}",
                    self.association.confidence_threshold
                ),
            });
        }

        let lifecycle = &self.lifecycle;
        if lifecycle.confirm_hits == 0 {
            return Err(ConfigurationError::InvalidParameter {
                name: "lifecycle.confirm_hits",
                description: "must be at least 1".to_string(),
            });
        }
        positive("lifecycle.ball_delete_after", lifecycle.ball_delete_after)?;
        positive("lifecycle.robot_delete_after", lifecycle.robot_delete_after)?;
        positive("lifecycle.observer_timeout", lifecycle.observer_timeout)?;
        positive("lifecycle.merge_gate", lifecycle.merge_gate)?;

        non_negative("fusion.ball_grace", self.fusion.ball_grace)?;
        Ok(())
    }
}
