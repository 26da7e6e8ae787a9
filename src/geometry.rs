//! Field geometry and camera calibration reference data
//!
//! Static for a session and read-only. Geometry is used to discard sightings
//! that fall outside the plausible playing area; calibrations are validated and
//! kept so that the set of known cameras is fixed before frames arrive.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigurationError;
use crate::types::CameraId;

/// A named straight field marking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldLine {
    pub name: String,
    pub p1: [f64; 2],
    pub p2: [f64; 2],
    #[serde(default)]
    pub thickness: f64,
}

/// A named circular arc field marking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldArc {
    pub name: String,
    pub center: [f64; 2],
    pub radius: f64,
    pub a1: f64,
    pub a2: f64,
    #[serde(default)]
    pub thickness: f64,
}

/// Field dimensions (mm)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldGeometry {
    pub field_length: f64,
    pub field_width: f64,
    pub goal_width: f64,
    pub goal_depth: f64,
    pub boundary_width: f64,
    #[serde(default)]
    pub field_lines: Vec<FieldLine>,
    #[serde(default)]
    pub field_arcs: Vec<FieldArc>,
}

impl FieldGeometry {
    /// Division B field without markings
    pub fn division_b() -> Self {
        Self {
            field_length: 9000.0,
            field_width: 6000.0,
            goal_width: 1000.0,
            goal_depth: 180.0,
            boundary_width: 300.0,
            field_lines: Vec::new(),
            field_arcs: Vec::new(),
        }
    }

    /// Reject non-positive or non-finite dimensions
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let dims = [
            ("field_length", self.field_length),
            ("field_width", self.field_width),
            ("goal_width", self.goal_width),
            ("goal_depth", self.goal_depth),
        ];
        for (field, value) in dims {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigurationError::InvalidFieldDimension { field, value });
            }
        }
        if !(self.boundary_width.is_finite() && self.boundary_width >= 0.0) {
            return Err(ConfigurationError::InvalidFieldDimension {
                field: "boundary_width",
                value: self.boundary_width,
            });
        }
        for arc in &self.field_arcs {
            if !(arc.radius.is_finite() && arc.radius > 0.0) {
                return Err(ConfigurationError::InvalidFieldDimension {
                    field: "field_arcs.radius",
                    value: arc.radius,
                });
            }
        }
        Ok(())
    }

    /// Half extents `(x, y)` of the marked field.
    ///
    /// Uses the outermost line endpoints when markings are present, otherwise
    /// the nominal length and width.
    pub fn half_extents(&self) -> (f64, f64) {
        let nominal = (self.field_length / 2.0, self.field_width / 2.0);
        self.field_lines
            .iter()
            .flat_map(|l| [l.p1, l.p2])
            .fold(nominal, |(hx, hy), [x, y]| (hx.max(x.abs()), hy.max(y.abs())))
    }

    /// Whether `(x, y)` lies within the field, boundary and `margin`.
    ///
    /// The goal boxes extend the x range by `goal_depth` inside the goal mouth.
    pub fn contains(&self, x: f64, y: f64, margin: f64) -> bool {
        if !x.is_finite() || !y.is_finite() {
            return false;
        }
        let (hx, hy) = self.half_extents();
        let y_limit = hy + self.boundary_width + margin;
        let mut x_limit = hx + self.boundary_width + margin;
        if y.abs() <= self.goal_width / 2.0 {
            x_limit = x_limit.max(hx + self.goal_depth + margin);
        }
        x.abs() <= x_limit && y.abs() <= y_limit
    }
}

/// Per-camera calibration as published by SSL vision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraCalibration {
    pub camera_id: CameraId,
    pub focal_length: f64,
    pub principal_point_x: f64,
    pub principal_point_y: f64,
    #[serde(default)]
    pub distortion: f64,
    /// Orientation quaternion `[q0, q1, q2, q3]`
    pub q: [f64; 4],
    /// Translation `[tx, ty, tz]`
    pub t: [f64; 3],
}

impl CameraCalibration {
    /// Reject unusable calibration entries
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let invalid = |description: String| ConfigurationError::InvalidCalibration {
            camera_id: self.camera_id,
            description,
        };

        if !(self.focal_length.is_finite() && self.focal_length > 0.0) {
            return Err(invalid(format!(
                "focal length must be positive, got {}",
                self.focal_length
            )));
        }
        let scalars = [self.principal_point_x, self.principal_point_y, self.distortion];
        if scalars.iter().chain(self.t.iter()).any(|v| !v.is_finite()) {
            return Err(invalid("non-finite principal point, distortion or translation".to_string()));
        }
        let norm = self.q.iter().map(|v| v * v).sum::<f64>().sqrt();
        if !norm.is_finite() || (norm - 1.0).abs() > 1e-3 {
            return Err(invalid(format!("quaternion must be unit length, norm {}", norm)));
        }
        Ok(())
    }
}

/// Geometry and calibration for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceData {
    pub geometry: Option<FieldGeometry>,
    #[serde(default)]
    pub calibrations: Vec<CameraCalibration>,
}

impl ReferenceData {
    pub fn new(geometry: FieldGeometry, calibrations: Vec<CameraCalibration>) -> Self {
        Self {
            geometry: Some(geometry),
            calibrations,
        }
    }

    /// Parse from JSON
    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Validate everything and return the checked geometry and calibrations.
    pub fn validated(
        &self,
    ) -> Result<(FieldGeometry, BTreeMap<CameraId, CameraCalibration>), ConfigurationError> {
        let geometry = self
            .geometry
            .as_ref()
            .ok_or(ConfigurationError::MissingGeometry)?;
        geometry.validate()?;

        let mut cameras = BTreeMap::new();
        for calibration in &self.calibrations {
            calibration.validate()?;
            if cameras
                .insert(calibration.camera_id, calibration.clone())
                .is_some()
            {
                return Err(ConfigurationError::DuplicateCamera {
                    camera_id: calibration.camera_id,
                });
            }
        }
        Ok((geometry.clone(), cameras))
    }
}
