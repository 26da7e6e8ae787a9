//! Detection screening and gated cost matrices.
//!
//! Screening drops sightings that cannot be real (outside the field, below the
//! confidence threshold) before any distance is computed. The cost matrix then
//! holds squared Mahalanobis distances between each track's predicted
//! measurement and each detection, with pairs beyond the gate set to infinity.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::common::association::hungarian::{hungarian, HungarianResult};
use crate::config::AssociationConfig;
use crate::geometry::FieldGeometry;
use crate::motion::{MotionModel, PredictedMeasurement};
use crate::types::{Detection, ObjectClass};

/// Why a detection was discarded before gating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    OutOfBounds,
    LowConfidence,
    NonFinite,
}

/// Screen a detection against confidence and field bounds
pub fn screen_detection(
    detection: &Detection,
    geometry: &FieldGeometry,
    config: &AssociationConfig,
) -> Option<RejectReason> {
    if detection.measurement.iter().any(|v| !v.is_finite()) {
        return Some(RejectReason::NonFinite);
    }
    if detection.confidence < config.confidence_threshold {
        return Some(RejectReason::LowConfidence);
    }
    if !geometry.contains(detection.x(), detection.y(), config.field_margin) {
        return Some(RejectReason::OutOfBounds);
    }
    None
}

/// Squared Mahalanobis gate for a class
#[inline]
pub fn gate_for(class: &ObjectClass, config: &AssociationConfig) -> f64 {
    match class {
        ObjectClass::Ball => config.ball_gate,
        ObjectClass::Robot { .. } => config.robot_gate,
    }
}

/// Build the gated cost matrix for one class group.
///
/// Rows follow `predictions`, columns follow `detections`. Entries are the
/// squared Mahalanobis distance of the measurement residual under the
/// innovation covariance, or infinity when above `gate` or not computable.
pub fn gated_cost_matrix(
    model: &dyn MotionModel,
    predictions: &[&PredictedMeasurement],
    detections: &[&Detection],
    gate: f64,
) -> DMatrix<f64> {
    let mut cost = DMatrix::from_element(predictions.len(), detections.len(), f64::INFINITY);
    for (i, predicted) in predictions.iter().enumerate() {
        let chol = match predicted.covariance.clone().cholesky() {
            Some(chol) => chol,
            None => continue, // Row stays forbidden
        };
        for (j, detection) in detections.iter().enumerate() {
            let residual = model.measurement_residual(&detection.measurement, &predicted.mean);
            let d2 = residual.dot(&chol.solve(&residual));
            if d2.is_finite() && d2 <= gate {
                cost[(i, j)] = d2;
            }
        }
    }
    cost
}

/// An assignment as good as `solution` that avoids the pair `(row, col)`, if one exists.
///
/// The alternative must match as many pairs and reach the same total cost
/// within `tolerance` (relative). A gated competitor that only looks equal
/// locally, while its own row or column is better served elsewhere, does not
/// make the pair ambiguous.
pub fn equal_cost_alternative(
    cost: &DMatrix<f64>,
    solution: &HungarianResult,
    row: usize,
    col: usize,
    tolerance: f64,
) -> Option<HungarianResult> {
    let mut without = cost.clone();
    without[(row, col)] = f64::INFINITY;
    let alternative = hungarian(&without);

    let same_size = alternative.num_assigned() == solution.num_assigned();
    let same_cost = (alternative.cost - solution.cost).abs() <= tolerance * solution.cost.abs().max(1.0);
    (same_size && same_cost).then_some(alternative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::BallModel;
    use crate::types::DetectionFrame;
    use nalgebra::DVector;

    fn ball_detection(x: f64, y: f64, confidence: f64) -> Detection {
        let mut frame = DetectionFrame::new(0, 0, 0.0).with_ball(x, y);
        frame.balls[0].confidence = confidence;
        frame.detections().remove(0)
    }

    #[test]
    fn test_screening() {
        let field = FieldGeometry::division_b();
        let config = AssociationConfig::default();

        assert_eq!(screen_detection(&ball_detection(0.0, 0.0, 0.9), &field, &config), None);
        assert_eq!(
            screen_detection(&ball_detection(0.0, 0.0, 0.05), &field, &config),
            Some(RejectReason::LowConfidence)
        );
        // 5000 mm beyond the boundary
        assert_eq!(
            screen_detection(&ball_detection(4500.0 + 300.0 + 5000.0, 0.0, 0.9), &field, &config),
            Some(RejectReason::OutOfBounds)
        );
        assert_eq!(
            screen_detection(&ball_detection(f64::NAN, 0.0, 0.9), &field, &config),
            Some(RejectReason::NonFinite)
        );
    }

    #[test]
    fn test_cost_matrix_gates_far_pairs() {
        let model = BallModel::default();
        let state = model.initial_state(&DVector::from_vec(vec![0.0, 0.0]));
        let predicted = model.predict_measurement(&state);

        let near = ball_detection(3.0, 0.0, 1.0);
        let far = ball_detection(2000.0, 0.0, 1.0);
        let cost = gated_cost_matrix(&model, &[&predicted], &[&near, &far], 13.8);

        assert!(cost[(0, 0)].is_finite());
        assert!(cost[(0, 0)] < 1.0);
        assert!(cost[(0, 1)].is_infinite());
    }

    #[test]
    fn test_equal_cost_alternative() {
        // Row 0 can take either column at the same cost
        #[rustfmt::skip]
        let cost = DMatrix::from_row_slice(1, 2, &[1.0, 1.0]);
        let solution = hungarian(&cost);
        let alternative = equal_cost_alternative(&cost, &solution, 0, solution.row_to_col[0].unwrap(), 1e-9);
        assert!(alternative.is_some());

        // Equal entries in a row, but taking column 1 leaves row 1 unserved
        #[rustfmt::skip]
        let cost = DMatrix::from_row_slice(2, 2, &[
            1.0, 1.0,
            f64::INFINITY, 3.0,
        ]);
        let solution = hungarian(&cost);
        assert_eq!(solution.row_to_col, vec![Some(0), Some(1)]);
        assert!(equal_cost_alternative(&cost, &solution, 0, 0, 1e-9).is_none());
        assert!(equal_cost_alternative(&cost, &solution, 1, 1, 1e-9).is_none());

        #[rustfmt::skip]
        let cost = DMatrix::from_row_slice(2, 2, &[
            1.0, 2.0,
            2.5, 3.0,
        ]);
        let solution = hungarian(&cost);
        assert!(equal_cost_alternative(&cost, &solution, 0, 0, 1e-9).is_none());

        // Swapping is exactly as good
        #[rustfmt::skip]
        let cost = DMatrix::from_row_slice(2, 2, &[
            1.0, 2.0,
            2.0, 1.0,
        ]);
        let solution = hungarian(&cost);
        let alternative = equal_cost_alternative(&cost, &solution, 0, 0, 1e-9).unwrap();
        assert_eq!(alternative.row_to_col, vec![Some(1), Some(0)]);
    }
}
