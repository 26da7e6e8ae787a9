//! Replay runner for recorded or simulated detection frames.
//!
//! Build with `--features cli`.
//!
//! Usage:
//!     replay --frames <path.jsonl> [--config <tracker.json>] [--reference <reference.json>]
//!     replay --scenario match --num-frames 625 --tick-rate 100
//!
//! Output:
//!     One JSON [`OutputTick`] per line on stdout. Diagnostics go to the log.
//!     Exit 0 on success, non-zero on error.

use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use env_logger::Env;

use vision_filter_rs::bench_utils::{compute_stats, load_frames, preset, write_frames};
use vision_filter_rs::{
    CompositeReporter, DebugReporter, FieldGeometry, FrameIngest, LoggingReporter, OutputTick, ReferenceData,
    TrackerConfig, VisionFilter,
};

// =============================================================================
// CLI Arguments
// =============================================================================

#[derive(Parser)]
#[command(name = "replay")]
#[command(about = "Replay detection frames through the vision filter")]
struct Args {
    /// JSON-lines detection frames to replay
    #[arg(long, conflicts_with = "scenario")]
    frames: Option<PathBuf>,

    /// Simulated scenario preset (stationary, rolling, match)
    #[arg(long, default_value = "match")]
    scenario: String,

    /// Frames per camera for simulated scenarios
    #[arg(long, default_value_t = 625)]
    num_frames: usize,

    /// Tracker configuration JSON; defaults are used when absent
    #[arg(long)]
    config: Option<PathBuf>,

    /// Geometry and calibration JSON; a Division B field is used when absent
    #[arg(long)]
    reference: Option<PathBuf>,

    /// Output ticks per second of capture time
    #[arg(long, default_value_t = 100.0)]
    tick_rate: f64,

    /// Also write the replayed frames as JSON lines
    #[arg(long)]
    dump_frames: Option<PathBuf>,

    /// Log every pipeline event, not only lifecycle transitions
    #[arg(long, short)]
    verbose: bool,
}

// =============================================================================
// Main
// =============================================================================

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    if !(args.tick_rate > 0.0) {
        return Err(format!("tick rate must be positive, got {}", args.tick_rate).into());
    }

    let config = match &args.config {
        Some(path) => TrackerConfig::from_file(path)?,
        None => TrackerConfig::default(),
    };
    let reference = match &args.reference {
        Some(path) => ReferenceData::from_file(path)?,
        None => ReferenceData::new(FieldGeometry::division_b(), vec![]),
    };

    let frames = match &args.frames {
        Some(path) => load_frames(path)?,
        None => preset(&args.scenario, args.num_frames)?.generate(),
    };
    log::info!("replaying {} frames", frames.len());

    if let Some(path) = &args.dump_frames {
        write_frames(BufWriter::new(std::fs::File::create(path)?), &frames)?;
    }

    let logging = if args.verbose {
        LoggingReporter::verbose()
    } else {
        LoggingReporter::new()
    };
    let reporter = CompositeReporter::new(logging, DebugReporter::new());
    let mut filter = VisionFilter::with_reporter(config.clone(), &reference, reporter)?;

    // Recordings may interleave cameras out of order; the reorder buffer sorts them.
    let mut ingest = FrameIngest::new(config.ingest);
    for frame in frames {
        ingest.push(frame);
    }
    let ordered = ingest.flush();

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let tick_period = 1.0 / args.tick_rate;
    let mut next_tick = ordered.first().map(|f| f.t_capture);
    let mut frame_times = Vec::with_capacity(ordered.len());

    for frame in ordered {
        while let Some(t) = next_tick.filter(|&t| t <= frame.t_capture) {
            filter.finish_cycle();
            emit(&mut out, &filter.tick(t))?;
            next_tick = Some(t + tick_period);
        }
        let start = Instant::now();
        filter.process_frame(frame);
        frame_times.push(start.elapsed().as_micros() as f64 / 1000.0);
    }
    filter.finish_cycle();
    if let Some(t) = next_tick {
        emit(&mut out, &filter.tick(t))?;
    }
    out.flush()?;

    let (mean_ms, std_ms) = compute_stats(&frame_times);
    let diagnostics = filter.diagnostics();
    log::info!(
        "{} frames in {} cycles, {:.3} ± {:.3} ms per frame",
        diagnostics.frames_processed,
        diagnostics.cycles,
        mean_ms,
        std_ms
    );
    log::info!(
        "tracks: {} created, {} confirmed, {} deleted, {} merged, {} resets",
        diagnostics.tracks_created,
        diagnostics.tracks_confirmed,
        diagnostics.tracks_deleted,
        diagnostics.merges,
        diagnostics.resets
    );
    let debug = filter.reporter().second();
    log::debug!("{} events recorded over {} ticks", debug.events().len(), debug.ticks().len());
    Ok(())
}

fn emit<W: Write>(out: &mut W, tick: &OutputTick) -> io::Result<()> {
    serde_json::to_writer(&mut *out, tick)?;
    out.write_all(b"\n")
}
