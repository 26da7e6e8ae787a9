//! The tracking pipeline
//!
//! [`VisionFilter`] ties the stages together on the single consumer path:
//!
//! ```text
//! FrameIngest --frames--> cycle grouping --> Associator --> TrackManager --> TrackStore
//!                                                                              |
//!                                            TickPublisher <-- FusionOutput <--+
//! ```
//!
//! Frames whose capture times lie within `cycle_window` of the first frame of
//! a cycle are processed together. A cycle is staged on a copy of the track
//! store and committed in one step, so readers never observe a partially
//! applied cycle, and stopping between cycles leaves the store consistent.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::association::Associator;
use crate::config::TrackerConfig;
use crate::errors::Result;
use crate::geometry::{CameraCalibration, FieldGeometry, ReferenceData};
use crate::ingest::FrameIngest;
use crate::manager::TrackManager;
use crate::motion::ModelSet;
use crate::output::{FusionOutput, OutputTick, TickPublisher};
use crate::reporter::{Diagnostics, NoOpReporter, PipelineEvent, StepReporter};
use crate::track::TrackStore;
use crate::types::{CameraId, DetectionFrame};

/// Multi-camera ball and robot tracker
#[derive(Debug)]
pub struct VisionFilter<R: StepReporter = NoOpReporter> {
    config: TrackerConfig,
    geometry: FieldGeometry,
    calibrations: BTreeMap<CameraId, CameraCalibration>,
    store: TrackStore,
    associator: Associator,
    manager: TrackManager,
    output: FusionOutput,
    publisher: TickPublisher,
    diagnostics: Diagnostics,
    reporter: R,
    /// Frames of the cycle being collected
    cycle: Vec<DetectionFrame>,
    /// Capture time of the newest frame accepted
    last_frame_time: Option<f64>,
    uncalibrated: BTreeSet<CameraId>,
    tick_sequence: u64,
}

impl VisionFilter<NoOpReporter> {
    /// Create a tracker, validating configuration and reference data first.
    pub fn new(config: TrackerConfig, reference: &ReferenceData) -> Result<Self> {
        Self::with_reporter(config, reference, NoOpReporter)
    }
}

impl<R: StepReporter> VisionFilter<R> {
    /// Create a tracker with a custom reporter.
    ///
    /// Fails with [`FilterError::Configuration`](crate::FilterError::Configuration)
    /// before any frame is accepted if the configuration or reference data is
    /// unusable.
    pub fn with_reporter(config: TrackerConfig, reference: &ReferenceData, reporter: R) -> Result<Self> {
        config.validate()?;
        let (geometry, calibrations) = reference.validated()?;

        let models = ModelSet::from_config(&config);
        log::info!(
            "vision filter ready: {:.0}x{:.0} mm field, {} calibrated cameras",
            geometry.field_length,
            geometry.field_width,
            calibrations.len()
        );

        Ok(Self {
            associator: Associator::new(models.clone(), config.association.clone(), geometry.clone()),
            manager: TrackManager::new(models.clone(), config.lifecycle.clone()),
            output: FusionOutput::new(models, config.fusion.clone()),
            config,
            geometry,
            calibrations,
            store: TrackStore::new(),
            publisher: TickPublisher::new(),
            diagnostics: Diagnostics::new(),
            reporter,
            cycle: Vec::new(),
            last_frame_time: None,
            uncalibrated: BTreeSet::new(),
            tick_sequence: 0,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn geometry(&self) -> &FieldGeometry {
        &self.geometry
    }

    pub fn calibration(&self, camera_id: CameraId) -> Option<&CameraCalibration> {
        self.calibrations.get(&camera_id)
    }

    /// Committed track state
    pub fn store(&self) -> &TrackStore {
        &self.store
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// A handle to the output slot; clone it for the consumer thread
    pub fn publisher(&self) -> TickPublisher {
        self.publisher.clone()
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    pub fn reporter_mut(&mut self) -> &mut R {
        &mut self.reporter
    }

    pub fn into_reporter(self) -> R {
        self.reporter
    }

    /// Frames collected for the cycle not yet committed
    pub fn pending_frames(&self) -> usize {
        self.cycle.len()
    }

    // ========================================================================
    // Processing
    // ========================================================================

    /// Add one frame, committing the open cycle first if the frame starts a new one.
    ///
    /// Frames must arrive in non-decreasing capture order; older frames are
    /// dropped as late. Frames with a non-finite capture time are dropped and
    /// counted in [`Diagnostics::invalid_frames`].
    pub fn process_frame(&mut self, frame: DetectionFrame) {
        if !frame.t_capture.is_finite() {
            self.diagnostics.invalid_frames += 1;
            log::warn!(
                "cam {} frame {} has non-finite capture time, dropped",
                frame.camera_id,
                frame.frame_number
            );
            return;
        }

        if let Some(last) = self.last_frame_time {
            if frame.t_capture < last {
                self.emit(PipelineEvent::LateFrameDropped {
                    camera_id: frame.camera_id,
                    frame_number: frame.frame_number,
                    t_capture: frame.t_capture,
                    released_until: last,
                });
                return;
            }
        }

        if !self.calibrations.is_empty()
            && !self.calibrations.contains_key(&frame.camera_id)
            && self.uncalibrated.insert(frame.camera_id)
        {
            log::warn!("frames from camera {} which has no calibration", frame.camera_id);
        }

        if let Some(first) = self.cycle.first() {
            if frame.t_capture - first.t_capture > self.config.ingest.cycle_window {
                self.finish_cycle();
            }
        }
        self.last_frame_time = Some(frame.t_capture);
        self.cycle.push(frame);
    }

    /// Process a batch of frames and commit the final cycle
    pub fn process_frames<I>(&mut self, frames: I)
    where
        I: IntoIterator<Item = DetectionFrame>,
    {
        for frame in frames {
            self.process_frame(frame);
        }
        self.finish_cycle();
    }

    /// Commit the open cycle, if any
    pub fn finish_cycle(&mut self) {
        if self.cycle.is_empty() {
            return;
        }
        let frames = std::mem::take(&mut self.cycle);
        self.process_cycle(&frames);
    }

    /// Apply one cycle of frames atomically
    fn process_cycle(&mut self, frames: &[DetectionFrame]) {
        let Some(last) = frames.last() else {
            return;
        };
        let t_end = last.t_capture;

        let mut staged = self.store.clone();
        let mut events = Vec::new();
        for frame in frames {
            self.manager.sanitize(&mut staged, &mut events);
            let outcome = self.associator.associate(&staged, frame);
            self.reporter.on_association(frame, &outcome);
            self.manager.apply_frame(&mut staged, frame, &outcome, &mut events);
            self.diagnostics.detections += outcome.detections.len() as u64;
        }
        self.manager.end_cycle(&mut staged, t_end, &mut events);
        self.store = staged;

        self.diagnostics.frames_processed += frames.len() as u64;
        self.diagnostics.cycles += 1;
        for event in events {
            self.emit(event);
        }
        self.reporter.on_cycle_complete(t_end, frames.len(), self.store.len());
    }

    /// Forward ingest events and process every frame ready at `now`.
    ///
    /// Returns the number of frames released. The last cycle stays open until
    /// a later frame or [`finish_cycle`](Self::finish_cycle) closes it.
    pub fn run(&mut self, ingest: &mut FrameIngest, now: Instant) -> usize {
        for event in ingest.take_events() {
            self.emit(event);
        }
        let mut released = 0;
        while let Some(frame) = ingest.next_ready(now) {
            self.process_frame(frame);
            released += 1;
        }
        released
    }

    /// Drain the rest of `ingest` and commit everything (end of stream)
    pub fn flush(&mut self, ingest: &mut FrameIngest) -> usize {
        for event in ingest.take_events() {
            self.emit(event);
        }
        let frames = ingest.flush();
        let released = frames.len();
        self.process_frames(frames);
        released
    }

    /// Run until `stop` is set, polling `ingest` every `poll` and publishing a
    /// tick every `tick_interval` of wall time.
    ///
    /// `clock` maps wall time to the capture time base used for ticks.
    /// Stopping happens between cycles; the open cycle is committed first.
    pub fn run_until<F>(
        &mut self,
        ingest: &mut FrameIngest,
        stop: &AtomicBool,
        poll: Duration,
        tick_interval: Duration,
        clock: F,
    ) where
        F: Fn(Instant) -> f64,
    {
        let mut next_tick = Instant::now();
        while !stop.load(Ordering::Acquire) {
            let now = Instant::now();
            self.run(ingest, now);
            if now >= next_tick {
                self.tick(clock(now));
                next_tick = now + tick_interval;
            }
            std::thread::sleep(poll);
        }
        self.finish_cycle();
        log::info!("stopped after {} cycles", self.diagnostics.cycles);
    }

    /// Produce and publish the estimates at time `t`
    pub fn tick(&mut self, t: f64) -> OutputTick {
        let tick = OutputTick {
            sequence: self.tick_sequence,
            t,
            estimates: self.output.estimates(&self.store, t),
        };
        self.tick_sequence += 1;
        if self.publisher.publish(tick.clone()) {
            log::trace!("tick {} replaced an unread tick", tick.sequence);
        }
        self.reporter.on_tick(&tick);
        tick
    }

    /// Start a new session: drop all tracks and the open cycle.
    ///
    /// Track ids keep increasing across sessions.
    pub fn reset(&mut self) {
        self.store.clear();
        self.cycle.clear();
        self.last_frame_time = None;
        log::info!("session reset");
    }

    fn emit(&mut self, event: PipelineEvent) {
        self.diagnostics.record(&event);
        self.reporter.on_event(&event);
    }
}
