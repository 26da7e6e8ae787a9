//! Tracker construction helpers

use vision_filter_rs::{DebugReporter, FieldGeometry, ReferenceData, TrackerConfig, VisionFilter};

/// Camera period at 62.5 Hz
pub const FRAME_DT: f64 = 0.016;

pub fn division_b() -> ReferenceData {
    ReferenceData::new(FieldGeometry::division_b(), vec![])
}

/// A field large enough that a hard kick never leaves it
pub fn open_field() -> ReferenceData {
    ReferenceData::new(
        FieldGeometry {
            field_length: 40000.0,
            field_width: 40000.0,
            ..FieldGeometry::division_b()
        },
        vec![],
    )
}

/// Tracker recording every event, on a Division B field
pub fn debug_filter() -> VisionFilter<DebugReporter> {
    debug_filter_with(TrackerConfig::default(), &division_b())
}

pub fn debug_filter_with(config: TrackerConfig, reference: &ReferenceData) -> VisionFilter<DebugReporter> {
    VisionFilter::with_reporter(config, reference, DebugReporter::new()).expect("valid tracker setup")
}

/// Install a test logger once; repeated calls are harmless
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
