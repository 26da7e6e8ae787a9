//! Producer threads feeding one tracker, and a reader polling ticks

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use vision_filter_rs::{DetectionFrame, FrameIngest, IngestConfig, TrackStatus};

use crate::helpers::setup::{debug_filter, FRAME_DT};

fn camera_frames(camera_id: u32, phase: f64, n: u64) -> Vec<DetectionFrame> {
    (0..n)
        .map(|k| DetectionFrame::new(camera_id, k, k as f64 * FRAME_DT + phase).with_ball(300.0, -200.0))
        .collect()
}

#[test]
fn test_producers_on_threads_release_in_order() {
    let mut filter = debug_filter();
    let mut ingest = FrameIngest::new(IngestConfig::default());

    thread::scope(|s| {
        for (camera_id, phase) in [(0, 0.0), (1, 0.004), (2, 0.009)] {
            let producer = ingest.producer();
            s.spawn(move || {
                for frame in camera_frames(camera_id, phase, 100) {
                    producer.push(frame);
                    thread::sleep(Duration::from_micros(50));
                }
            });
        }
    });

    let released = filter.flush(&mut ingest);
    assert_eq!(released, 300);
    assert_eq!(filter.diagnostics().frames_processed, 300);
    assert_eq!(filter.diagnostics().late_frames, 0);

    let associations = filter.reporter().associations();
    assert_eq!(associations.len(), 300);
    assert_eq!(filter.store().len(), 1);
    assert_eq!(filter.store().ball_tracks().next().unwrap().status, TrackStatus::Confirmed);
}

#[test]
fn test_run_until_stops_between_cycles() {
    let mut filter = debug_filter();
    let reader = filter.publisher();
    // Release only once every camera has moved past a frame
    let mut ingest = FrameIngest::new(IngestConfig {
        max_delay: 10.0,
        ..IngestConfig::default()
    });
    let stop = AtomicBool::new(false);

    let cameras = [(0, 0.0), (1, 0.004)];
    let mut streams: Vec<_> = cameras.iter().map(|&(id, phase)| camera_frames(id, phase, 50)).collect();
    // Both cameras are known before any frame can be released
    for stream in &mut streams {
        ingest.push(stream.remove(0));
    }

    thread::scope(|s| {
        for stream in streams {
            let producer = ingest.producer();
            s.spawn(move || {
                for frame in stream {
                    producer.push(frame);
                    thread::sleep(Duration::from_micros(200));
                }
            });
        }
        s.spawn(|| {
            thread::sleep(Duration::from_millis(150));
            stop.store(true, Ordering::Release);
        });

        filter.run_until(
            &mut ingest,
            &stop,
            Duration::from_millis(1),
            Duration::from_millis(5),
            |_| 0.0,
        );
    });

    assert_eq!(filter.pending_frames(), 0);
    assert!(filter.diagnostics().frames_processed > 0);
    filter.flush(&mut ingest);
    assert_eq!(filter.diagnostics().frames_processed, 100);
    assert_eq!(filter.diagnostics().late_frames, 0);

    assert!(reader.published() > 0);
    assert!(reader.take().is_some());
}
