//! Detection frame and object identity types
//!
//! Mirrors the SSL vision detection schema as consumed by the filter. Frames
//! and sightings are immutable camera-local observations; [`Detection`] is the
//! class-tagged form the associator works with.

use std::fmt;

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::common::linalg::wrap_angle;

/// Identifier of a vision camera
pub type CameraId = u32;

/// Unique track identifier. Allocated monotonically and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrackId(pub u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Robot team colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamColor {
    Yellow,
    Blue,
}

/// Object class tag.
///
/// Selects the motion and measurement model and restricts association:
/// detections are only ever compared with tracks of the same class.
/// The derived ordering (ball first, then robots by team and id) is the
/// emission order of fused output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ObjectClass {
    Ball,
    Robot { team: TeamColor, id: u32 },
}

impl ObjectClass {
    #[inline]
    pub fn is_ball(&self) -> bool {
        matches!(self, ObjectClass::Ball)
    }
}

impl fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectClass::Ball => write!(f, "ball"),
            ObjectClass::Robot { team, id } => write!(f, "{:?}#{}", team, id),
        }
    }
}

/// A single ball sighting from one camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallSighting {
    pub confidence: f64,
    #[serde(default)]
    pub area: u32,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    pub pixel_x: f64,
    pub pixel_y: f64,
}

/// A single robot sighting from one camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotSighting {
    pub confidence: f64,
    pub robot_id: u32,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub orientation: f64,
    pub pixel_x: f64,
    pub pixel_y: f64,
    #[serde(default)]
    pub height: f64,
}

/// One detection frame as produced by a single camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionFrame {
    /// Per-camera frame counter, intended to be monotonic
    pub frame_number: u64,
    /// Capture timestamp (seconds); used for ordering
    pub t_capture: f64,
    /// Send timestamp (seconds); used for latency monitoring
    pub t_sent: f64,
    pub camera_id: CameraId,
    #[serde(default)]
    pub balls: Vec<BallSighting>,
    #[serde(default)]
    pub yellow_robots: Vec<RobotSighting>,
    #[serde(default)]
    pub blue_robots: Vec<RobotSighting>,
}

impl DetectionFrame {
    /// Create an empty frame
    pub fn new(camera_id: CameraId, frame_number: u64, t_capture: f64) -> Self {
        Self {
            frame_number,
            t_capture,
            t_sent: t_capture,
            camera_id,
            balls: Vec::new(),
            yellow_robots: Vec::new(),
            blue_robots: Vec::new(),
        }
    }

    /// Builder helper: add a ball sighting at a field position
    pub fn with_ball(mut self, x: f64, y: f64) -> Self {
        self.balls.push(BallSighting {
            confidence: 1.0,
            area: 0,
            x,
            y,
            z: 0.0,
            pixel_x: 0.0,
            pixel_y: 0.0,
        });
        self
    }

    /// Builder helper: add a robot sighting at a field pose
    pub fn with_robot(mut self, team: TeamColor, robot_id: u32, x: f64, y: f64, orientation: f64) -> Self {
        let sighting = RobotSighting {
            confidence: 1.0,
            robot_id,
            x,
            y,
            orientation,
            pixel_x: 0.0,
            pixel_y: 0.0,
            height: 0.0,
        };
        match team {
            TeamColor::Yellow => self.yellow_robots.push(sighting),
            TeamColor::Blue => self.blue_robots.push(sighting),
        }
        self
    }

    /// Processing latency `t_sent - t_capture`
    #[inline]
    pub fn latency(&self) -> f64 {
        self.t_sent - self.t_capture
    }

    /// Total number of sightings in the frame
    pub fn num_sightings(&self) -> usize {
        self.balls.len() + self.yellow_robots.len() + self.blue_robots.len()
    }

    /// Flatten the frame into class-tagged detections, balls first.
    pub fn detections(&self) -> Vec<Detection> {
        let mut out = Vec::with_capacity(self.num_sightings());
        for ball in &self.balls {
            out.push(Detection {
                class: ObjectClass::Ball,
                measurement: DVector::from_vec(vec![ball.x, ball.y]),
                confidence: ball.confidence,
                camera_id: self.camera_id,
                t_capture: self.t_capture,
            });
        }
        let robots = self
            .yellow_robots
            .iter()
            .map(|r| (TeamColor::Yellow, r))
            .chain(self.blue_robots.iter().map(|r| (TeamColor::Blue, r)));
        for (team, robot) in robots {
            out.push(Detection {
                class: ObjectClass::Robot {
                    team,
                    id: robot.robot_id,
                },
                measurement: DVector::from_vec(vec![robot.x, robot.y, wrap_angle(robot.orientation)]),
                confidence: robot.confidence,
                camera_id: self.camera_id,
                t_capture: self.t_capture,
            });
        }
        out
    }
}

/// A class-tagged, camera-local measurement.
///
/// Ball measurements are `[x, y]`; robot measurements are `[x, y, θ]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub class: ObjectClass,
    pub measurement: DVector<f64>,
    pub confidence: f64,
    pub camera_id: CameraId,
    pub t_capture: f64,
}

impl Detection {
    #[inline]
    pub fn x(&self) -> f64 {
        self.measurement[0]
    }

    #[inline]
    pub fn y(&self) -> f64 {
        self.measurement[1]
    }
}
