//! Ground truth and detection frame generation
//!
//! Simulates ball and robot trajectories seen by a set of cameras, for tests,
//! benchmarks and the replay runner. The ball decelerates under rolling
//! friction with the closed-form `x = x₀ + v·t - sign(v)·a·t²/2` per axis.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::common::linalg::wrap_angle;
use crate::types::{CameraId, DetectionFrame, TeamColor};

/// Closed-form ball trajectory under constant friction deceleration
#[derive(Debug, Clone, PartialEq)]
pub struct BallTrajectory {
    pub start: [f64; 2],
    pub velocity: [f64; 2],
    /// Deceleration magnitude (mm/s²), applied per axis
    pub friction_decel: f64,
}

impl BallTrajectory {
    pub fn stationary(x: f64, y: f64) -> Self {
        Self {
            start: [x, y],
            velocity: [0.0, 0.0],
            friction_decel: 0.0,
        }
    }

    pub fn rolling(start: [f64; 2], velocity: [f64; 2], friction_decel: f64) -> Self {
        Self {
            start,
            velocity,
            friction_decel,
        }
    }

    fn axis(&self, x0: f64, v: f64, t: f64) -> (f64, f64) {
        let a = self.friction_decel;
        if a <= 0.0 || v == 0.0 {
            return (x0 + v * t, v);
        }
        let stop = v.abs() / a;
        let tau = t.min(stop);
        let x = x0 + v * tau - v.signum() * a * tau * tau / 2.0;
        let v_t = if t >= stop { 0.0 } else { v - v.signum() * a * t };
        (x, v_t)
    }

    /// Position at time `t` (s) after the start
    pub fn position_at(&self, t: f64) -> [f64; 2] {
        [
            self.axis(self.start[0], self.velocity[0], t).0,
            self.axis(self.start[1], self.velocity[1], t).0,
        ]
    }

    /// Velocity at time `t` (s) after the start
    pub fn velocity_at(&self, t: f64) -> [f64; 2] {
        [
            self.axis(self.start[0], self.velocity[0], t).1,
            self.axis(self.start[1], self.velocity[1], t).1,
        ]
    }
}

/// Constant velocity, constant turn rate robot
#[derive(Debug, Clone, PartialEq)]
pub struct RobotTrajectory {
    pub team: TeamColor,
    pub robot_id: u32,
    pub start: [f64; 2],
    pub orientation: f64,
    pub velocity: [f64; 2],
    pub angular_velocity: f64,
}

impl RobotTrajectory {
    pub fn parked(team: TeamColor, robot_id: u32, x: f64, y: f64, orientation: f64) -> Self {
        Self {
            team,
            robot_id,
            start: [x, y],
            orientation,
            velocity: [0.0, 0.0],
            angular_velocity: 0.0,
        }
    }

    /// `[x, y, θ]` at time `t`
    pub fn pose_at(&self, t: f64) -> [f64; 3] {
        [
            self.start[0] + self.velocity[0] * t,
            self.start[1] + self.velocity[1] * t,
            wrap_angle(self.orientation + self.angular_velocity * t),
        ]
    }
}

/// One simulated camera
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedCamera {
    pub camera_id: CameraId,
    /// Capture time offset (s) relative to the frame clock
    pub phase: f64,
    /// `t_sent - t_capture` (s)
    pub latency: f64,
    /// Standard deviation (mm) of position noise
    pub position_noise: f64,
    /// Standard deviation (rad) of orientation noise
    pub orientation_noise: f64,
    /// Probability that an object in view is detected
    pub detection_probability: f64,
    /// Only objects with `x` in this range are in view
    pub x_range: (f64, f64),
}

impl SimulatedCamera {
    /// Noise-free camera covering the whole field
    pub fn ideal(camera_id: CameraId) -> Self {
        Self {
            camera_id,
            phase: 0.0,
            latency: 0.004,
            position_noise: 0.0,
            orientation_noise: 0.0,
            detection_probability: 1.0,
            x_range: (f64::NEG_INFINITY, f64::INFINITY),
        }
    }

    pub fn with_noise(mut self, position: f64, orientation: f64) -> Self {
        self.position_noise = position;
        self.orientation_noise = orientation;
        self
    }

    pub fn with_phase(mut self, phase: f64) -> Self {
        self.phase = phase;
        self
    }

    pub fn with_x_range(mut self, min: f64, max: f64) -> Self {
        self.x_range = (min, max);
        self
    }

    pub fn with_detection_probability(mut self, p: f64) -> Self {
        self.detection_probability = p;
        self
    }

    fn sees(&self, x: f64) -> bool {
        x >= self.x_range.0 && x <= self.x_range.1
    }
}

/// A simulated match situation
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Frame rate per camera (Hz)
    pub rate_hz: f64,
    /// Frames per camera
    pub num_frames: usize,
    pub start_time: f64,
    pub cameras: Vec<SimulatedCamera>,
    pub ball: Option<BallTrajectory>,
    pub robots: Vec<RobotTrajectory>,
    pub seed: u64,
}

impl Scenario {
    pub fn new(rate_hz: f64, num_frames: usize) -> Self {
        Self {
            rate_hz,
            num_frames,
            start_time: 0.0,
            cameras: vec![SimulatedCamera::ideal(0)],
            ball: None,
            robots: Vec::new(),
            seed: 42,
        }
    }

    pub fn with_cameras(mut self, cameras: Vec<SimulatedCamera>) -> Self {
        self.cameras = cameras;
        self
    }

    pub fn with_ball(mut self, ball: BallTrajectory) -> Self {
        self.ball = Some(ball);
        self
    }

    pub fn with_robot(mut self, robot: RobotTrajectory) -> Self {
        self.robots.push(robot);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Time (s) since the scenario start of frame `k` on a camera with `phase`
    pub fn frame_time(&self, k: usize, phase: f64) -> f64 {
        k as f64 / self.rate_hz + phase
    }

    /// Generate all frames, sorted by capture time then camera.
    pub fn generate(&self) -> Vec<DetectionFrame> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut frames = Vec::with_capacity(self.num_frames * self.cameras.len());

        for camera in &self.cameras {
            let position = Normal::new(0.0, camera.position_noise).ok();
            let orientation = Normal::new(0.0, camera.orientation_noise).ok();
            let noise = |dist: &Option<Normal<f64>>, rng: &mut StdRng| dist.map_or(0.0, |d| d.sample(rng));

            for k in 0..self.num_frames {
                let elapsed = self.frame_time(k, camera.phase);
                let t_capture = self.start_time + elapsed;
                let mut frame = DetectionFrame::new(camera.camera_id, k as u64, t_capture);
                frame.t_sent = t_capture + camera.latency;

                if let Some(ball) = &self.ball {
                    let [x, y] = ball.position_at(elapsed);
                    if camera.sees(x) && rng.gen::<f64>() < camera.detection_probability {
                        let nx = noise(&position, &mut rng);
                        let ny = noise(&position, &mut rng);
                        frame = frame.with_ball(x + nx, y + ny);
                    }
                }

                for robot in &self.robots {
                    let [x, y, theta] = robot.pose_at(elapsed);
                    if camera.sees(x) && rng.gen::<f64>() < camera.detection_probability {
                        let nx = noise(&position, &mut rng);
                        let ny = noise(&position, &mut rng);
                        let nt = noise(&orientation, &mut rng);
                        frame = frame.with_robot(robot.team, robot.robot_id, x + nx, y + ny, wrap_angle(theta + nt));
                    }
                }
                frames.push(frame);
            }
        }

        frames.sort_by(|a, b| {
            a.t_capture
                .total_cmp(&b.t_capture)
                .then(a.camera_id.cmp(&b.camera_id))
        });
        frames
    }
}
