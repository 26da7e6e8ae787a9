//! Motion and measurement models
//!
//! Each object class has a [`MotionModel`] that owns the prediction and update
//! math for that class. Models are pure: no I/O, no shared state, and the same
//! inputs always give the same outputs.
//!
//! - [`BallModel`] - constant velocity with rolling-friction deceleration
//! - [`RobotModel`] - constant velocity translation, random-walk orientation
//! - [`ModelSet`] - dispatch table from [`ObjectClass`] to model

pub mod ball;
pub mod robot;

pub use ball::BallModel;
pub use robot::RobotModel;

use nalgebra::{DMatrix, DVector};

use crate::common::linalg::{is_positive_semidefinite, kalman_update, symmetrize};
use crate::config::TrackerConfig;
use crate::errors::{FilterError, Result};
use crate::types::{ObjectClass, TeamColor};

/// Mean and covariance of a state estimate
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianState {
    /// State estimate mean
    pub mean: DVector<f64>,
    /// State estimate covariance
    pub covariance: DMatrix<f64>,
}

impl GaussianState {
    #[inline]
    pub fn new(mean: DVector<f64>, covariance: DMatrix<f64>) -> Self {
        Self { mean, covariance }
    }

    /// Get state dimension from mean vector
    #[inline]
    pub fn x_dim(&self) -> usize {
        self.mean.len()
    }

    /// Whether the covariance is symmetric PSD and the mean finite
    pub fn is_valid(&self) -> bool {
        self.mean.iter().all(|v| v.is_finite()) && is_positive_semidefinite(&self.covariance)
    }
}

/// Predicted measurement and its innovation covariance, used for gating.
#[derive(Debug, Clone)]
pub struct PredictedMeasurement {
    /// `H x`
    pub mean: DVector<f64>,
    /// `S = H P Hᵀ + R`
    pub covariance: DMatrix<f64>,
}

/// Per-class state transition and measurement model.
///
/// Implementors provide the transition function, its linearisation, the
/// process noise, and a linear measurement model. The Kalman update is shared.
pub trait MotionModel: Send + Sync {
    /// State dimension
    fn x_dim(&self) -> usize;

    /// Measurement dimension
    fn z_dim(&self) -> usize;

    /// Propagate the mean through the transition function
    fn transition(&self, mean: &DVector<f64>, dt: f64) -> DVector<f64>;

    /// Linearised transition matrix
    fn transition_matrix(&self, dt: f64) -> DMatrix<f64>;

    /// Process noise for a step of length `dt`
    fn process_noise(&self, dt: f64) -> DMatrix<f64>;

    /// Measurement matrix `H`
    fn measurement_matrix(&self) -> DMatrix<f64>;

    /// Measurement noise `R`
    fn measurement_noise(&self) -> DMatrix<f64>;

    /// Seed a state from a single measurement
    fn initial_state(&self, measurement: &DVector<f64>) -> GaussianState;

    /// Measurement-space residual `a - b`
    fn measurement_residual(&self, a: &DVector<f64>, b: &DVector<f64>) -> DVector<f64> {
        a - b
    }

    /// State-space residual `a - b`
    fn state_residual(&self, a: &DVector<f64>, b: &DVector<f64>) -> DVector<f64> {
        a - b
    }

    /// Bring a state back into canonical form (e.g. wrap angles)
    fn normalize(&self, _mean: &mut DVector<f64>) {}

    /// Performs the prediction step.
    ///
    /// - x_pred = f(x, dt)
    /// - P_pred = F * P * F^T + Q
    ///
    /// Negative `dt` is treated as zero.
    fn predict(&self, state: &GaussianState, dt: f64) -> GaussianState {
        let dt = dt.max(0.0);
        let f = self.transition_matrix(dt);
        let mut mean = self.transition(&state.mean, dt);
        self.normalize(&mut mean);
        let covariance = symmetrize(&(&f * &state.covariance * f.transpose() + self.process_noise(dt)));
        GaussianState { mean, covariance }
    }

    /// Predicted measurement and innovation covariance
    fn predict_measurement(&self, state: &GaussianState) -> PredictedMeasurement {
        let h = self.measurement_matrix();
        let mean = &h * &state.mean;
        let covariance = symmetrize(&(&h * &state.covariance * h.transpose() + self.measurement_noise()));
        PredictedMeasurement { mean, covariance }
    }

    /// Performs the update step.
    ///
    /// Returns [`FilterError::NumericalInstability`] if the corrected
    /// covariance is not symmetric positive semi-definite; the caller must not
    /// keep such a result.
    fn update(&self, predicted: &GaussianState, measurement: &DVector<f64>) -> Result<GaussianState> {
        if measurement.len() != self.z_dim() {
            return Err(FilterError::DimensionMismatch {
                expected: self.z_dim(),
                actual: measurement.len(),
                context: "measurement".to_string(),
            });
        }
        if predicted.x_dim() != self.x_dim() {
            return Err(FilterError::DimensionMismatch {
                expected: self.x_dim(),
                actual: predicted.x_dim(),
                context: "state".to_string(),
            });
        }

        let h = self.measurement_matrix();
        let innovation = self.measurement_residual(measurement, &(&h * &predicted.mean));
        let (mut mean, covariance) = kalman_update(
            &predicted.mean,
            &predicted.covariance,
            &innovation,
            &h,
            &self.measurement_noise(),
        )?;
        self.normalize(&mut mean);

        let updated = GaussianState { mean, covariance };
        if !updated.is_valid() {
            return Err(FilterError::NumericalInstability {
                description: "updated covariance is not symmetric positive semi-definite".to_string(),
            });
        }
        Ok(updated)
    }

    /// Planar position `[x, y]` of a state
    fn position(&self, mean: &DVector<f64>) -> [f64; 2] {
        [mean[0], mean[1]]
    }

    /// Planar velocity `[vx, vy]` of a state
    fn velocity(&self, mean: &DVector<f64>) -> [f64; 2];
}

/// Dispatch table from object class to motion model.
///
/// Robots of `known_team` use the known-robot noise preset, all others the
/// unknown-robot preset.
#[derive(Debug, Clone)]
pub struct ModelSet {
    pub ball: BallModel,
    pub known_robot: RobotModel,
    pub unknown_robot: RobotModel,
    pub known_team: Option<TeamColor>,
}

impl ModelSet {
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self {
            ball: BallModel::from_config(&config.ball),
            known_robot: RobotModel::from_config(&config.robot, &config.robot.known),
            unknown_robot: RobotModel::from_config(&config.robot, &config.robot.unknown),
            known_team: config.robot.known_team,
        }
    }

    /// Model for a class
    pub fn for_class(&self, class: &ObjectClass) -> &dyn MotionModel {
        match class {
            ObjectClass::Ball => &self.ball,
            ObjectClass::Robot { team, .. } if Some(*team) == self.known_team => &self.known_robot,
            ObjectClass::Robot { .. } => &self.unknown_robot,
        }
    }
}

impl Default for ModelSet {
    fn default() -> Self {
        Self::from_config(&TrackerConfig::default())
    }
}
