//! Benchmark utilities shared between Criterion benchmarks and the replay binary.
//!
//! This module provides:
//! - Scenario presets for benchmarks and soak runs
//! - JSON-lines reading and writing of detection frames
//! - Per-cycle timing statistics

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::time::Instant;

use crate::common::ground_truth::{BallTrajectory, RobotTrajectory, Scenario, SimulatedCamera};
use crate::errors::ConfigurationError;
use crate::pipeline::VisionFilter;
use crate::reporter::StepReporter;
use crate::types::{DetectionFrame, TeamColor};

// =============================================================================
// Scenario Presets
// =============================================================================

/// Frame rate of a standard SSL vision camera (Hz)
pub const CAMERA_RATE_HZ: f64 = 62.5;

/// Robots per team in a Division B match
pub const ROBOTS_PER_TEAM: u32 = 6;

/// Ball lying still in front of one camera
pub fn stationary_ball(num_frames: usize) -> Scenario {
    Scenario::new(CAMERA_RATE_HZ, num_frames)
        .with_cameras(vec![SimulatedCamera::ideal(0).with_noise(2.0, 0.0)])
        .with_ball(BallTrajectory::stationary(0.0, 0.0))
}

/// Ball kicked diagonally from the centre, slowing under friction
pub fn rolling_ball(num_frames: usize, friction_decel: f64) -> Scenario {
    Scenario::new(CAMERA_RATE_HZ, num_frames)
        .with_cameras(vec![SimulatedCamera::ideal(0)])
        .with_ball(BallTrajectory::rolling([0.0, 0.0], [8000.0, 8000.0], friction_decel))
}

/// Two overlapping cameras, a moving ball and full teams
pub fn full_match(num_frames: usize) -> Scenario {
    let cameras = vec![
        SimulatedCamera::ideal(0).with_noise(3.0, 0.01).with_x_range(-5000.0, 500.0),
        SimulatedCamera::ideal(1)
            .with_noise(3.0, 0.01)
            .with_x_range(-500.0, 5000.0)
            .with_phase(0.004),
    ];
    let mut scenario = Scenario::new(CAMERA_RATE_HZ, num_frames)
        .with_cameras(cameras)
        .with_ball(BallTrajectory::rolling([-2000.0, -1000.0], [1500.0, 600.0], 686.0));

    for id in 0..ROBOTS_PER_TEAM {
        let y = -2000.0 + 800.0 * id as f64;
        scenario = scenario
            .with_robot(RobotTrajectory {
                team: TeamColor::Yellow,
                robot_id: id,
                start: [-3000.0, y],
                orientation: 0.0,
                velocity: [300.0, 0.0],
                angular_velocity: 0.5,
            })
            .with_robot(RobotTrajectory::parked(TeamColor::Blue, id, 2500.0, y, std::f64::consts::PI));
    }
    scenario
}

/// Look up a preset by name
pub fn preset(name: &str, num_frames: usize) -> Result<Scenario, String> {
    match name {
        "stationary" => Ok(stationary_ball(num_frames)),
        "rolling" => Ok(rolling_ball(num_frames, 686.0)),
        "match" => Ok(full_match(num_frames)),
        other => Err(format!("unknown scenario preset '{}'", other)),
    }
}

// =============================================================================
// JSON-lines Frames
// =============================================================================

/// Parse detection frames, one JSON object per line. Blank lines are skipped.
pub fn parse_frames<R: BufRead>(reader: R) -> Result<Vec<DetectionFrame>, ConfigurationError> {
    let mut frames = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let frame = serde_json::from_str(&line).map_err(|e| ConfigurationError::Parse {
            description: format!("line {}: {}", index + 1, e),
        })?;
        frames.push(frame);
    }
    Ok(frames)
}

/// Load a JSON-lines frame recording
pub fn load_frames(path: impl AsRef<Path>) -> Result<Vec<DetectionFrame>, ConfigurationError> {
    let file = fs::File::open(path)?;
    parse_frames(BufReader::new(file))
}

/// Write frames as JSON lines
pub fn write_frames<W: Write>(mut writer: W, frames: &[DetectionFrame]) -> Result<(), ConfigurationError> {
    for frame in frames {
        serde_json::to_writer(&mut writer, frame)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

// =============================================================================
// Timing
// =============================================================================

/// Feed `frames` through `filter`, returning `(mean_ms, std_ms)` per frame
pub fn time_frames<R: StepReporter>(filter: &mut VisionFilter<R>, frames: &[DetectionFrame]) -> (f64, f64) {
    let mut frame_times = Vec::with_capacity(frames.len());
    for frame in frames {
        let start = Instant::now();
        filter.process_frame(frame.clone());
        frame_times.push(start.elapsed().as_micros() as f64 / 1000.0);
    }
    filter.finish_cycle();
    compute_stats(&frame_times)
}

/// Mean and population standard deviation
pub fn compute_stats(samples: &[f64]) -> (f64, f64) {
    if samples.is_empty() {
        return (0.0, 0.0);
    }
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}
