//! Robot motion model
//!
//! State `[x, y, θ, vx, vy, ω]`, measurement `[x, y, θ]`. Translation is
//! constant velocity; orientation integrates ω and is kept in `[-π, π)`.
//! Velocities follow a random walk whose variance grows linearly with `dt`.

use nalgebra::{DMatrix, DVector};

use super::{GaussianState, MotionModel};
use crate::common::linalg::wrap_angle;
use crate::config::{RobotModelConfig, RobotNoise};

/// Index of the orientation component in state and measurement
const THETA: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct RobotModel {
    pub position_variance: f64,
    pub orientation_variance: f64,
    pub velocity_variance: f64,
    pub angular_velocity_variance: f64,
    pub initial_velocity_variance: f64,
    pub initial_angular_velocity_variance: f64,
}

impl RobotModel {
    pub fn from_config(config: &RobotModelConfig, noise: &RobotNoise) -> Self {
        Self {
            position_variance: noise.position_variance,
            orientation_variance: config.orientation_variance,
            velocity_variance: noise.velocity_variance,
            angular_velocity_variance: noise.angular_velocity_variance,
            initial_velocity_variance: config.initial_velocity_variance,
            initial_angular_velocity_variance: config.initial_angular_velocity_variance,
        }
    }
}

impl Default for RobotModel {
    fn default() -> Self {
        let config = RobotModelConfig::default();
        Self::from_config(&config, &config.unknown)
    }
}

impl MotionModel for RobotModel {
    fn x_dim(&self) -> usize {
        6
    }

    fn z_dim(&self) -> usize {
        3
    }

    fn transition(&self, mean: &DVector<f64>, dt: f64) -> DVector<f64> {
        let mut next = mean.clone();
        next[0] += dt * mean[3];
        next[1] += dt * mean[4];
        next[THETA] = wrap_angle(mean[THETA] + dt * mean[5]);
        next
    }

    fn transition_matrix(&self, dt: f64) -> DMatrix<f64> {
        let mut f = DMatrix::identity(6, 6);
        f[(0, 3)] = dt;
        f[(1, 4)] = dt;
        f[(2, 5)] = dt;
        f
    }

    fn process_noise(&self, dt: f64) -> DMatrix<f64> {
        DMatrix::from_diagonal(&DVector::from_vec(vec![
            0.0,
            0.0,
            0.0,
            self.velocity_variance * dt,
            self.velocity_variance * dt,
            self.angular_velocity_variance * dt,
        ]))
    }

    fn measurement_matrix(&self) -> DMatrix<f64> {
        let mut h = DMatrix::zeros(3, 6);
        h[(0, 0)] = 1.0;
        h[(1, 1)] = 1.0;
        h[(2, 2)] = 1.0;
        h
    }

    fn measurement_noise(&self) -> DMatrix<f64> {
        DMatrix::from_diagonal(&DVector::from_vec(vec![
            self.position_variance,
            self.position_variance,
            self.orientation_variance,
        ]))
    }

    fn initial_state(&self, measurement: &DVector<f64>) -> GaussianState {
        let mean = DVector::from_vec(vec![
            measurement[0],
            measurement[1],
            wrap_angle(measurement[THETA]),
            0.0,
            0.0,
            0.0,
        ]);
        let covariance = DMatrix::from_diagonal(&DVector::from_vec(vec![
            self.position_variance,
            self.position_variance,
            self.orientation_variance,
            self.initial_velocity_variance,
            self.initial_velocity_variance,
            self.initial_angular_velocity_variance,
        ]));
        GaussianState::new(mean, covariance)
    }

    fn measurement_residual(&self, a: &DVector<f64>, b: &DVector<f64>) -> DVector<f64> {
        let mut r = a - b;
        r[THETA] = wrap_angle(r[THETA]);
        r
    }

    fn state_residual(&self, a: &DVector<f64>, b: &DVector<f64>) -> DVector<f64> {
        let mut r = a - b;
        r[THETA] = wrap_angle(r[THETA]);
        r
    }

    fn normalize(&self, mean: &mut DVector<f64>) {
        mean[THETA] = wrap_angle(mean[THETA]);
    }

    fn velocity(&self, mean: &DVector<f64>) -> [f64; 2] {
        [mean[3], mean[4]]
    }
}
