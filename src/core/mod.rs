//! Core functionality for the motion recorder.
//!
//! This module contains:
//! - Background subtraction, mask cleaning and the change metric
//! - The recording state machine with its hysteresis timer
//! - Rate smoothing and the per-frame pipeline tying it all together
//! - Manifests describing finished recordings

pub mod background;
pub mod clock;
pub mod contours;
pub mod detector;
pub mod ema;
pub mod fps;
pub mod manifest;
pub mod mask;
pub mod morphology;
pub mod pipeline;
pub mod recorder;
pub mod timer;

// Re-export commonly used types
pub use background::{BackgroundConfig, BackgroundModel};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use contours::{change_metric, find_contours, ChangeMetric, Contour, Point};
pub use detector::{Detection, MotionDetector};
pub use ema::Ema;
pub use fps::RateMonitor;
pub use manifest::{load_manifests, ManifestBuilder, RecordingManifest, PRODUCER_NAME};
pub use mask::ForegroundMask;
pub use morphology::{KernelShape, MorphologicalCleaner, StructuringElement};
pub use pipeline::{FrameReport, MotionPipeline};
pub use recorder::{
    Recorder, RecorderAction, RecorderConfig, RecorderState, RecordingSession, SessionSummary,
};
pub use timer::RecordingTimer;
