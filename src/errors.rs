//! Error types for the tracking pipeline
//!
//! Recoverable per-frame conditions (late frames, out-of-bounds sightings,
//! ambiguous associations) are not errors; they are reported as
//! [`PipelineEvent`](crate::reporter::PipelineEvent)s. The types here cover
//! configuration problems, which are fatal for a session, and numerical
//! failures, which the track manager turns into track resets.

use std::fmt;

/// Errors that can occur while filtering
#[derive(Debug, Clone, PartialEq)]
pub enum FilterError {
    /// Matrix inversion or factorisation failed
    SingularMatrix {
        /// Which matrix failed
        context: String,
    },

    /// Dimension mismatch between expected and actual
    DimensionMismatch {
        /// What was expected
        expected: usize,
        /// What was received
        actual: usize,
        /// Context (e.g., "state dimension", "measurement dimension")
        context: String,
    },

    /// A covariance lost symmetry or positive semi-definiteness
    NumericalInstability {
        /// Description of the issue
        description: String,
    },

    /// Reference data or tracker parameters are invalid
    Configuration(ConfigurationError),
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::SingularMatrix { context } => {
                write!(f, "Matrix inversion failed: {}", context)
            }
            FilterError::DimensionMismatch {
                expected,
                actual,
                context,
            } => {
                write!(
                    f,
                    "Dimension mismatch for {}: expected {}, got {}",
                    context, expected, actual
                )
            }
            FilterError::NumericalInstability { description } => {
                write!(f, "Numerical instability: {}", description)
            }
            FilterError::Configuration(e) => write!(f, "Configuration error: {}", e),
        }
    }
}

impl std::error::Error for FilterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FilterError::Configuration(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigurationError> for FilterError {
    fn from(e: ConfigurationError) -> Self {
        FilterError::Configuration(e)
    }
}

/// Errors in geometry, calibration or tracker configuration.
///
/// These are raised before any frame is processed and end the session.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// Field geometry is absent
    MissingGeometry,

    /// A field dimension is non-positive or not finite
    InvalidFieldDimension {
        /// Name of the offending field
        field: &'static str,
        /// Value that was rejected
        value: f64,
    },

    /// A camera calibration entry is unusable
    InvalidCalibration {
        /// Camera the calibration belongs to
        camera_id: u32,
        /// What is wrong with it
        description: String,
    },

    /// Two calibration entries share a camera id
    DuplicateCamera {
        /// The repeated camera id
        camera_id: u32,
    },

    /// A tracker parameter is out of range
    InvalidParameter {
        /// Dotted parameter path, e.g. `lifecycle.confirm_hits`
        name: &'static str,
        /// Description of the constraint that was violated
        description: String,
    },

    /// Configuration could not be read or parsed
    Parse {
        /// Parser or I/O message
        description: String,
    },
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::MissingGeometry => write!(f, "field geometry is missing"),
            ConfigurationError::InvalidFieldDimension { field, value } => {
                write!(f, "field dimension {} must be positive, got {}", field, value)
            }
            ConfigurationError::InvalidCalibration {
                camera_id,
                description,
            } => {
                write!(f, "camera {} calibration invalid: {}", camera_id, description)
            }
            ConfigurationError::DuplicateCamera { camera_id } => {
                write!(f, "camera {} calibrated more than once", camera_id)
            }
            ConfigurationError::InvalidParameter { name, description } => {
                write!(f, "parameter {}: {}", name, description)
            }
            ConfigurationError::Parse { description } => {
                write!(f, "could not parse configuration: {}", description)
            }
        }
    }
}

impl std::error::Error for ConfigurationError {}

impl From<serde_json::Error> for ConfigurationError {
    fn from(e: serde_json::Error) -> Self {
        ConfigurationError::Parse {
            description: e.to_string(),
        }
    }
}

impl From<std::io::Error> for ConfigurationError {
    fn from(e: std::io::Error) -> Self {
        ConfigurationError::Parse {
            description: e.to_string(),
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, FilterError>;
