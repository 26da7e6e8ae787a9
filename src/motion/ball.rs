//! Ball motion model
//!
//! State `[x, y, vx, vy]`, measurement `[x, y]`.
//!
//! The ball rolls with constant deceleration due to friction, applied on each
//! axis against the sign of that axis' velocity:
//!
//! ```text
//! x' = x + v·dt - sign(v)·a·dt²/2
//! v' = v - sign(v)·a·dt
//! ```
//!
//! Friction never reverses a velocity: if the ball would stop inside the step
//! it stops, travelling `v²/(2a)`. Speeds inside the dead-zone get no friction.
//! Slip/roll transitions, bounces and kicks are left to the process noise.

use nalgebra::{DMatrix, DVector};

use super::{GaussianState, MotionModel};
use crate::config::BallModelConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct BallModel {
    /// Friction deceleration magnitude (mm/s²)
    pub friction_decel: f64,
    /// Per-axis speed below which friction is ignored (mm/s)
    pub friction_deadzone: f64,
    /// Piecewise white-noise acceleration variance
    pub process_variance: f64,
    /// Measurement variance per axis
    pub measurement_variance: f64,
    pub initial_position_variance: f64,
    pub initial_velocity_variance: f64,
}

impl BallModel {
    pub fn from_config(config: &BallModelConfig) -> Self {
        Self {
            friction_decel: config.friction_decel,
            friction_deadzone: config.friction_deadzone,
            process_variance: config.process_variance,
            measurement_variance: config.measurement_variance,
            initial_position_variance: config.initial_position_variance,
            initial_velocity_variance: config.initial_velocity_variance,
        }
    }

    /// Advance one axis `(position, velocity)` by `dt` under friction.
    pub fn roll(&self, position: f64, velocity: f64, dt: f64) -> (f64, f64) {
        let a = self.friction_decel;
        if a <= 0.0 || velocity.abs() <= self.friction_deadzone {
            return (position + velocity * dt, velocity);
        }

        let sign = velocity.signum();
        let stop_time = velocity.abs() / a;
        if dt >= stop_time {
            (position + sign * velocity * velocity / (2.0 * a), 0.0)
        } else {
            (
                position + velocity * dt - sign * a * dt * dt / 2.0,
                velocity - sign * a * dt,
            )
        }
    }
}

impl Default for BallModel {
    fn default() -> Self {
        Self::from_config(&BallModelConfig::default())
    }
}

impl MotionModel for BallModel {
    fn x_dim(&self) -> usize {
        4
    }

    fn z_dim(&self) -> usize {
        2
    }

    fn transition(&self, mean: &DVector<f64>, dt: f64) -> DVector<f64> {
        let (x, vx) = self.roll(mean[0], mean[2], dt);
        let (y, vy) = self.roll(mean[1], mean[3], dt);
        DVector::from_vec(vec![x, y, vx, vy])
    }

    fn transition_matrix(&self, dt: f64) -> DMatrix<f64> {
        #[rustfmt::skip]
        let f = DMatrix::from_row_slice(4, 4, &[
            1.0, 0.0, dt,  0.0,   // x' = x + dt*vx
            0.0, 1.0, 0.0, dt,    // y' = y + dt*vy
            0.0, 0.0, 1.0, 0.0,   // vx' = vx
            0.0, 0.0, 0.0, 1.0,   // vy' = vy
        ]);
        f
    }

    fn process_noise(&self, dt: f64) -> DMatrix<f64> {
        // Piecewise white noise: acceleration constant within a step,
        // uncorrelated between steps
        let q = self.process_variance;
        let dt2 = dt * dt;
        let dt3 = dt2 * dt;
        let dt4 = dt3 * dt;
        #[rustfmt::skip]
        let r = DMatrix::from_row_slice(4, 4, &[
            q * dt4 / 4.0,  0.0,            q * dt3 / 2.0,  0.0,
            0.0,            q * dt4 / 4.0,  0.0,            q * dt3 / 2.0,
            q * dt3 / 2.0,  0.0,            q * dt2,        0.0,
            0.0,            q * dt3 / 2.0,  0.0,            q * dt2,
        ]);
        r
    }

    fn measurement_matrix(&self) -> DMatrix<f64> {
        #[rustfmt::skip]
        let h = DMatrix::from_row_slice(2, 4, &[
            1.0, 0.0, 0.0, 0.0,   // z[0] = x
            0.0, 1.0, 0.0, 0.0,   // z[1] = y
        ]);
        h
    }

    fn measurement_noise(&self) -> DMatrix<f64> {
        DMatrix::identity(2, 2) * self.measurement_variance
    }

    fn initial_state(&self, measurement: &DVector<f64>) -> GaussianState {
        let mean = DVector::from_vec(vec![measurement[0], measurement[1], 0.0, 0.0]);
        let p = self.initial_position_variance;
        let v = self.initial_velocity_variance;
        let covariance = DMatrix::from_diagonal(&DVector::from_vec(vec![p, p, v, v]));
        GaussianState::new(mean, covariance)
    }

    fn velocity(&self, mean: &DVector<f64>) -> [f64; 2] {
        [mean[2], mean[3]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frictionless() -> BallModel {
        BallModel {
            friction_decel: 0.0,
            ..BallModel::default()
        }
    }

    #[test]
    fn test_roll_matches_constant_deceleration() {
        let model = BallModel {
            friction_decel: 686.0,
            ..BallModel::default()
        };
        let (x, v) = model.roll(0.0, 8000.0, 2.0);
        // 8000*2 - 686*4/2
        assert!((x - 14628.0).abs() < 1e-9);
        assert!((v - 6628.0).abs() < 1e-9);

        // Negative velocity decelerates towards zero too
        let (x, v) = model.roll(0.0, -8000.0, 2.0);
        assert!((x + 14628.0).abs() < 1e-9);
        assert!((v + 6628.0).abs() < 1e-9);
    }

    #[test]
    fn test_roll_stops_without_reversing() {
        let model = BallModel {
            friction_decel: 500.0,
            ..BallModel::default()
        };
        let (x, v) = model.roll(100.0, 1000.0, 5.0);
        assert_eq!(v, 0.0);
        // v²/(2a) = 1e6 / 1000
        assert!((x - 1100.0).abs() < 1e-9);
    }

    #[test]
    fn test_roll_deadzone() {
        let model = BallModel {
            friction_deadzone: 1.0,
            ..BallModel::default()
        };
        let (x, v) = model.roll(0.0, 0.5, 1.0);
        assert_eq!((x, v), (0.5, 0.5));
    }

    #[test]
    fn test_predict_stationary_keeps_position() {
        let model = BallModel::default();
        let state = model.initial_state(&DVector::from_vec(vec![120.0, -40.0]));
        let predicted = model.predict(&state, 0.016);
        assert!((predicted.mean[0] - 120.0).abs() < 1e-12);
        assert!((predicted.mean[1] + 40.0).abs() < 1e-12);
        // Uncertainty grows
        assert!(predicted.covariance[(0, 0)] > state.covariance[(0, 0)]);
    }

    #[test]
    fn test_predict_zero_dt_is_identity_on_mean() {
        let model = frictionless();
        let state = GaussianState::new(
            DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0]),
            DMatrix::identity(4, 4),
        );
        let predicted = model.predict(&state, 0.0);
        assert_eq!(predicted.mean, state.mean);
        assert_eq!(predicted.covariance, state.covariance);
    }

    #[test]
    fn test_update_pulls_towards_measurement() {
        let model = BallModel::default();
        let state = model.initial_state(&DVector::from_vec(vec![0.0, 0.0]));
        let predicted = model.predict(&state, 0.016);
        let updated = model
            .update(&predicted, &DVector::from_vec(vec![10.0, -10.0]))
            .unwrap();
        assert!(updated.mean[0] > 0.0 && updated.mean[0] < 10.0);
        assert!(updated.mean[1] < 0.0 && updated.mean[1] > -10.0);
        assert!(updated.covariance[(0, 0)] < predicted.covariance[(0, 0)]);
        assert!(updated.is_valid());
    }

    #[test]
    fn test_process_noise_is_psd() {
        let model = BallModel::default();
        assert!(crate::common::linalg::is_positive_semidefinite(
            &model.process_noise(0.016)
        ));
    }
}
