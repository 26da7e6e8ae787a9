//! Linear algebra utilities
//!
//! Gaussian helpers shared by the motion models, the associator and the
//! cross-camera merge: Mahalanobis distances, covariance hygiene and
//! information-form fusion.

use nalgebra::{DMatrix, DVector};
use std::f64::consts::PI;

use crate::errors::{FilterError, Result};

/// Relative jitter used when checking positive semi-definiteness.
///
/// A covariance passes the check if `P + ε·max(diag(P), 1)·I` admits a
/// Cholesky factorisation.
pub const PSD_JITTER: f64 = 1e-9;

/// Wrap an angle into `[-π, π)`.
#[inline]
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    // rem_euclid can return exactly 2π for tiny negative inputs
    if wrapped >= PI {
        wrapped - 2.0 * PI
    } else {
        wrapped
    }
}

/// Compute squared Mahalanobis distance of a residual
///
/// # Arguments
/// * `residual` - Difference between point and mean
/// * `sigma` - Covariance matrix
///
/// # Returns
/// `residualᵀ Σ⁻¹ residual`, or infinity if `sigma` is not positive definite
pub fn mahalanobis_squared(residual: &DVector<f64>, sigma: &DMatrix<f64>) -> f64 {
    match sigma.clone().cholesky() {
        Some(chol) => {
            let inv_sigma_diff = chol.solve(residual);
            residual.dot(&inv_sigma_diff)
        }
        None => f64::INFINITY, // Singular covariance
    }
}

/// Compute Mahalanobis distance
///
/// # Arguments
/// * `x` - Point
/// * `mu` - Mean vector
/// * `sigma` - Covariance matrix
///
/// # Returns
/// Mahalanobis distance
pub fn mahalanobis_distance(x: &DVector<f64>, mu: &DVector<f64>, sigma: &DMatrix<f64>) -> f64 {
    mahalanobis_squared(&(x - mu), sigma).sqrt()
}

/// Make matrix symmetric
///
/// Ensures a matrix is symmetric by averaging with its transpose
pub fn symmetrize(matrix: &DMatrix<f64>) -> DMatrix<f64> {
    0.5 * (matrix + matrix.transpose())
}

/// Check if matrix is symmetric positive semi-definite
///
/// Rejects non-finite entries, asymmetry beyond rounding, and matrices whose
/// jittered Cholesky factorisation fails.
pub fn is_positive_semidefinite(matrix: &DMatrix<f64>) -> bool {
    if !matrix.is_square() || matrix.iter().any(|v| !v.is_finite()) {
        return false;
    }

    let scale = matrix.diagonal().iter().fold(1.0_f64, |acc, v| acc.max(v.abs()));
    let asymmetry = (matrix - matrix.transpose()).amax();
    if asymmetry > 1e-9 * scale {
        return false;
    }

    let n = matrix.nrows();
    let jittered = matrix + DMatrix::identity(n, n) * (PSD_JITTER * scale);
    jittered.cholesky().is_some()
}

/// Invert a symmetric positive definite matrix via Cholesky
pub fn spd_inverse(matrix: &DMatrix<f64>, context: &str) -> Result<DMatrix<f64>> {
    matrix
        .clone()
        .cholesky()
        .map(|chol| chol.inverse())
        .ok_or_else(|| FilterError::SingularMatrix {
            context: context.to_string(),
        })
}

/// Kalman filter update step
///
/// Performs a single measurement update with a Joseph-form covariance update
/// followed by symmetrisation. The caller supplies the residual so that angular
/// components can be wrapped.
///
/// # Arguments
/// * `x_pred` - Predicted state mean
/// * `p_pred` - Predicted state covariance
/// * `innovation` - Measurement residual `z - Hx`
/// * `h` - Measurement matrix
/// * `r` - Measurement noise covariance
///
/// # Returns
/// Tuple of (updated mean, updated covariance)
pub fn kalman_update(
    x_pred: &DVector<f64>,
    p_pred: &DMatrix<f64>,
    innovation: &DVector<f64>,
    h: &DMatrix<f64>,
    r: &DMatrix<f64>,
) -> Result<(DVector<f64>, DMatrix<f64>)> {
    // Innovation covariance
    let s = symmetrize(&(h * p_pred * h.transpose() + r));

    // Kalman gain K = P Hᵀ S⁻¹, via S Kᵀ = H P
    let chol = s.cholesky().ok_or_else(|| FilterError::SingularMatrix {
        context: "innovation covariance".to_string(),
    })?;
    let k = chol.solve(&(h * p_pred)).transpose();

    // Updated state
    let x_updated = x_pred + &k * innovation;

    // Updated covariance (Joseph form for numerical stability)
    let n = x_pred.len();
    let i_minus_kh = DMatrix::identity(n, n) - &k * h;
    let p_updated = &i_minus_kh * p_pred * i_minus_kh.transpose() + &k * r * k.transpose();

    Ok((x_updated, symmetrize(&p_updated)))
}

/// Fuse two Gaussian estimates in information form.
///
/// `Λ = P₁⁻¹ + P₂⁻¹`, `η = P₁⁻¹x₁ + P₂⁻¹x₂`, result `(Λ⁻¹η, Λ⁻¹)`.
/// `residual` maps `x₂ - x₁` so that wrapped components average correctly;
/// the second mean is re-expressed relative to the first before fusing.
pub fn information_fuse(
    x1: &DVector<f64>,
    p1: &DMatrix<f64>,
    x2: &DVector<f64>,
    p2: &DMatrix<f64>,
    residual: impl Fn(&DVector<f64>, &DVector<f64>) -> DVector<f64>,
) -> Result<(DVector<f64>, DMatrix<f64>)> {
    if x1.len() != x2.len() {
        return Err(FilterError::DimensionMismatch {
            expected: x1.len(),
            actual: x2.len(),
            context: "fused state".to_string(),
        });
    }

    let info1 = spd_inverse(p1, "first fused covariance")?;
    let info2 = spd_inverse(p2, "second fused covariance")?;

    let x2_local = x1 + residual(x2, x1);
    let info = symmetrize(&(&info1 + &info2));
    let eta = &info1 * x1 + &info2 * x2_local;

    let covariance = symmetrize(&spd_inverse(&info, "fused information matrix")?);
    let mean = &covariance * eta;
    Ok((mean, covariance))
}
