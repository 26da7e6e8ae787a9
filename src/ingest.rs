//! Frame ingestion and reordering
//!
//! Cameras deliver frames independently and with variable latency.
//! [`FrameProducer`] handles (one per camera thread, cheap to clone) insert
//! frames into a shared reorder buffer; the single [`FrameIngest`] consumer
//! releases them in non-decreasing capture-time order.
//!
//! The oldest pending frame is released once any of the following holds:
//!
//! - every active camera has reported a later capture time
//! - the newest capture time seen is at least `max_delay` ahead of it
//! - it has waited `max_delay` of wall time since arrival
//!
//! A camera is active while its newest capture time is within
//! `camera_timeout` of the newest capture time overall. Frames older than the
//! last released frame are dropped as late; repeated `(camera, frame_number)`
//! pairs are dropped as duplicates.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

use crate::config::IngestConfig;
use crate::reporter::PipelineEvent;
use crate::types::{CameraId, DetectionFrame};

/// Frame numbers remembered per camera for duplicate detection
const RECENT_FRAMES: usize = 64;

/// A buffered frame, ordered by capture time then arrival
#[derive(Debug)]
struct Pending {
    arrival_seq: u64,
    arrived: Instant,
    frame: DetectionFrame,
}

impl Pending {
    fn key_cmp(&self, other: &Self) -> Ordering {
        self.frame
            .t_capture
            .total_cmp(&other.frame.t_capture)
            .then(self.arrival_seq.cmp(&other.arrival_seq))
    }
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.key_cmp(other) == Ordering::Equal
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    // Reversed so the BinaryHeap pops the oldest frame first
    fn cmp(&self, other: &Self) -> Ordering {
        other.key_cmp(self)
    }
}

/// Per-camera ingestion statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CameraStats {
    /// Frames accepted into the buffer
    pub frames: u64,
    /// Mean `t_sent - t_capture` (s)
    pub mean_latency: f64,
    /// Newest capture time seen (s)
    pub last_capture: f64,
    #[serde(skip)]
    latency_sum: f64,
    #[serde(skip)]
    recent: VecDeque<u64>,
}

impl CameraStats {
    fn record(&mut self, frame: &DetectionFrame) {
        self.frames += 1;
        self.latency_sum += frame.latency();
        self.mean_latency = self.latency_sum / self.frames as f64;
        if self.frames == 1 || frame.t_capture > self.last_capture {
            self.last_capture = frame.t_capture;
        }
        self.recent.push_back(frame.frame_number);
        if self.recent.len() > RECENT_FRAMES {
            self.recent.pop_front();
        }
    }

    fn has_seen(&self, frame_number: u64) -> bool {
        self.recent.contains(&frame_number)
    }
}

/// Snapshot of reorder buffer statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestStats {
    pub received: u64,
    pub released: u64,
    pub late_dropped: u64,
    pub duplicate_dropped: u64,
    /// Frames with a non-finite capture time
    pub invalid_dropped: u64,
    /// Frames currently buffered
    pub depth: usize,
    pub max_depth: usize,
    /// Wall time (s) the oldest pending frame has waited
    pub oldest_pending_age: Option<f64>,
    /// Capture time of the last released frame
    pub released_until: Option<f64>,
    pub cameras: BTreeMap<CameraId, CameraStats>,
}

#[derive(Debug, Default)]
struct Buffer {
    heap: BinaryHeap<Pending>,
    next_seq: u64,
    newest_capture: Option<f64>,
    events: Vec<PipelineEvent>,
    stats: IngestStats,
}

impl Buffer {
    fn insert(&mut self, frame: DetectionFrame, arrived: Instant) -> bool {
        self.stats.received += 1;

        if !frame.t_capture.is_finite() {
            self.stats.invalid_dropped += 1;
            log::warn!(
                "cam {} frame {} has non-finite capture time, dropped",
                frame.camera_id,
                frame.frame_number
            );
            return false;
        }

        if let Some(released_until) = self.stats.released_until {
            if frame.t_capture < released_until {
                self.stats.late_dropped += 1;
                self.events.push(PipelineEvent::LateFrameDropped {
                    camera_id: frame.camera_id,
                    frame_number: frame.frame_number,
                    t_capture: frame.t_capture,
                    released_until,
                });
                return false;
            }
        }

        let camera = self.stats.cameras.entry(frame.camera_id).or_default();
        if camera.has_seen(frame.frame_number) {
            self.stats.duplicate_dropped += 1;
            self.events.push(PipelineEvent::DuplicateFrameDropped {
                camera_id: frame.camera_id,
                frame_number: frame.frame_number,
            });
            return false;
        }
        camera.record(&frame);

        self.newest_capture = Some(self.newest_capture.map_or(frame.t_capture, |t| t.max(frame.t_capture)));
        self.heap.push(Pending {
            arrival_seq: self.next_seq,
            arrived,
            frame,
        });
        self.next_seq += 1;
        self.stats.depth = self.heap.len();
        self.stats.max_depth = self.stats.max_depth.max(self.heap.len());
        true
    }

    fn ready(&self, oldest: &Pending, now: Instant, config: &IngestConfig) -> bool {
        let t0 = oldest.frame.t_capture;
        let Some(newest) = self.newest_capture else {
            return false;
        };

        if newest - t0 >= config.max_delay {
            return true;
        }
        if now.saturating_duration_since(oldest.arrived).as_secs_f64() >= config.max_delay {
            return true;
        }
        self.stats
            .cameras
            .values()
            .filter(|c| newest - c.last_capture <= config.camera_timeout)
            .all(|c| c.last_capture > t0)
    }

    fn pop(&mut self) -> Option<DetectionFrame> {
        let pending = self.heap.pop()?;
        self.stats.released += 1;
        self.stats.depth = self.heap.len();
        self.stats.released_until = Some(pending.frame.t_capture);
        Some(pending.frame)
    }

    fn pop_ready(&mut self, now: Instant, config: &IngestConfig) -> Option<DetectionFrame> {
        let ready = self.heap.peek().is_some_and(|p| self.ready(p, now, config));
        if ready {
            self.pop()
        } else {
            None
        }
    }

    fn oldest_pending_age(&self, now: Instant) -> Option<Duration> {
        self.heap
            .iter()
            .map(|p| now.saturating_duration_since(p.arrived))
            .max()
    }
}

/// Cloneable, thread-safe handle for inserting frames
#[derive(Debug, Clone)]
pub struct FrameProducer {
    shared: Arc<Mutex<Buffer>>,
}

impl FrameProducer {
    /// Insert a frame that arrived now. Returns false if it was dropped.
    pub fn push(&self, frame: DetectionFrame) -> bool {
        self.push_at(frame, Instant::now())
    }

    /// Insert a frame with an explicit arrival instant
    pub fn push_at(&self, frame: DetectionFrame, arrived: Instant) -> bool {
        self.shared.lock().insert(frame, arrived)
    }
}

/// Single-consumer reorder buffer.
///
/// Not `Clone`: there is exactly one consumer per session.
#[derive(Debug)]
pub struct FrameIngest {
    shared: Arc<Mutex<Buffer>>,
    config: IngestConfig,
}

impl FrameIngest {
    pub fn new(config: IngestConfig) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Buffer::default())),
            config,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// A new producer handle for this buffer
    pub fn producer(&self) -> FrameProducer {
        FrameProducer {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Insert a frame directly from the consumer side
    pub fn push(&self, frame: DetectionFrame) -> bool {
        self.shared.lock().insert(frame, Instant::now())
    }

    /// Lazily release every frame that is ready at `now`
    pub fn drain(&mut self, now: Instant) -> Drain<'_> {
        Drain { ingest: self, now }
    }

    /// Release the next ready frame, if any
    pub fn next_ready(&mut self, now: Instant) -> Option<DetectionFrame> {
        self.shared.lock().pop_ready(now, &self.config)
    }

    /// Release everything still buffered, in order (end of stream)
    pub fn flush(&mut self) -> Vec<DetectionFrame> {
        let mut buffer = self.shared.lock();
        let frames: Vec<DetectionFrame> = std::iter::from_fn(|| buffer.pop()).collect();
        frames
    }

    /// Discard all buffered frames and statistics for a new session.
    ///
    /// Existing producers stay connected.
    pub fn reset(&mut self) {
        *self.shared.lock() = Buffer::default();
    }

    /// Events raised since the last call (late and duplicate drops)
    pub fn take_events(&mut self) -> Vec<PipelineEvent> {
        std::mem::take(&mut self.shared.lock().events)
    }

    /// Frames currently buffered
    pub fn depth(&self) -> usize {
        self.shared.lock().heap.len()
    }

    /// Wall time the longest-waiting buffered frame has been held
    pub fn oldest_pending_age(&self, now: Instant) -> Option<Duration> {
        self.shared.lock().oldest_pending_age(now)
    }

    /// Statistics snapshot at `now`
    pub fn stats(&self, now: Instant) -> IngestStats {
        let buffer = self.shared.lock();
        let mut stats = buffer.stats.clone();
        stats.oldest_pending_age = buffer.oldest_pending_age(now).map(|d| d.as_secs_f64());
        stats
    }
}

impl Default for FrameIngest {
    fn default() -> Self {
        Self::new(IngestConfig::default())
    }
}

/// Iterator over frames ready at a fixed instant
#[derive(Debug)]
pub struct Drain<'a> {
    ingest: &'a mut FrameIngest,
    now: Instant,
}

impl Iterator for Drain<'_> {
    type Item = DetectionFrame;

    fn next(&mut self) -> Option<DetectionFrame> {
        self.ingest.next_ready(self.now)
    }
}
