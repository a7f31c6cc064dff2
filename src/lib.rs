//! Motion Recorder - motion-triggered video recording.
//!
//! This library watches a stream of video frames, measures how much of each
//! frame differs from a learned background, and records the stream to a
//! video sink while the change stays above a threshold.
//!
//! # Behaviour
//!
//! - **Adaptive background**: a per-pixel Gaussian mixture absorbs slow
//!   lighting changes and scene changes that persist
//! - **Noise rejection**: morphological opening drops specks before the
//!   change is measured
//! - **Hysteresis**: recording continues for a window after the last
//!   triggering frame, so brief pauses in motion do not split a recording
//! - **Manifests**: every finished recording gets a JSON manifest
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Motion Recorder                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐            │
//! │  │   Source    │──▶│ Background  │──▶│   Opening   │            │
//! │  │ (raw/synth) │   │   (MOG)     │   │  (ellipse)  │            │
//! │  └─────────────┘   └─────────────┘   └─────────────┘            │
//! │                                             │                   │
//! │                                             ▼                   │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐            │
//! │  │    Sink     │◀──│  Recorder   │◀──│  Contours   │            │
//! │  │   (y4m)     │   │ (+ window)  │   │  (% area)   │            │
//! │  └─────────────┘   └─────────────┘   └─────────────┘            │
//! │         │                 │                                     │
//! │         ▼                 ▼                                     │
//! │  ┌─────────────┐   ┌─────────────┐                              │
//! │  │  Manifest   │   │  Activity   │                              │
//! │  │   (json)    │   │    Log      │                              │
//! │  └─────────────┘   └─────────────┘                              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use motion_recorder::{config::Config, core::MonotonicClock, sink::Y4mSink};
//! use motion_recorder::{MotionPipeline, SyntheticConfig, SyntheticSource};
//!
//! let config = Config::default();
//! let sink = Y4mSink::new(config.recording.output_dir.clone());
//! let mut pipeline = MotionPipeline::new(&config, sink, MonotonicClock::new()).unwrap();
//!
//! let mut source = SyntheticSource::new(SyntheticConfig::default());
//! source.start().expect("Failed to start source");
//!
//! for frame in source.receiver().iter().take(100) {
//!     let report = pipeline.process(&frame).unwrap();
//!     println!("{:.1}% changed, {}", report.change.percent, report.state);
//! }
//! pipeline.close();
//! ```

pub mod activity;
pub mod config;
pub mod core;
pub mod sink;
pub mod source;

// Re-export key types at crate root for convenience
pub use activity::{ActivityLog, ActivityStats, SharedActivityLog};
pub use config::{Config, ConfigError};
pub use core::{
    FrameReport, ManifestBuilder, MotionDetector, MotionPipeline, RecorderAction, RecorderState,
    SessionSummary,
};
pub use sink::{SinkError, VideoSink, VideoWriter};
pub use source::{
    CaptureError, Frame, FrameError, PixelFormat, RawVideoSource, SyntheticConfig,
    SyntheticSource,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
