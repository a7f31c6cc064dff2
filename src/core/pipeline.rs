//! The per-frame motion recording pipeline.
//!
//! ```text
//! Frame ─▶ BackgroundModel ─▶ opening ─▶ change metric ─▶ Recorder ─▶ sink
//!                                                 │
//!                                   RateMonitor ──┴─▶ FrameReport
//! ```
//!
//! Frames must be fed in capture order, one call per frame. Each pipeline
//! owns its detector, recorder, timer and rate monitor; nothing is shared
//! between pipelines.

use crate::activity::SharedActivityLog;
use crate::config::{Config, ConfigError};
use crate::core::clock::Clock;
use crate::core::contours::ChangeMetric;
use crate::core::detector::MotionDetector;
use crate::core::fps::RateMonitor;
use crate::core::recorder::{Recorder, RecorderAction, RecorderState, SessionSummary};
use crate::sink::VideoSink;
use crate::source::{Frame, FrameError};

/// What happened to one frame, for the caller to log or overlay.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub change: ChangeMetric,
    /// State after the frame was handled
    pub state: RecorderState,
    pub action: RecorderAction,
    /// Smoothed processing rate in frames per second
    pub fps: f64,
    pub warming_up: bool,
}

/// Detector, recorder and rate monitor wired together.
pub struct MotionPipeline<S: VideoSink, C: Clock + Clone> {
    detector: MotionDetector,
    recorder: Recorder<S, C>,
    fps: RateMonitor<C>,
    threshold_percent: f64,
    activity: Option<SharedActivityLog>,
}

impl<S: VideoSink, C: Clock + Clone> MotionPipeline<S, C> {
    /// Build a pipeline. The configuration is validated here and never again.
    pub fn new(config: &Config, sink: S, clock: C) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            detector: MotionDetector::new(&config.detector),
            recorder: Recorder::new(config.recorder_config(), sink, clock.clone())?,
            fps: RateMonitor::new(clock, config.rate.smooth_coef)?,
            threshold_percent: config.detector.threshold_percent,
            activity: None,
        })
    }

    /// Count frames and recordings into `log`.
    pub fn with_activity_log(mut self, log: SharedActivityLog) -> Self {
        self.activity = Some(log);
        self
    }

    pub fn state(&self) -> RecorderState {
        self.recorder.state()
    }

    pub fn recorder(&self) -> &Recorder<S, C> {
        &self.recorder
    }

    pub fn detector(&self) -> &MotionDetector {
        &self.detector
    }

    /// Run one frame through detection and the recording state machine.
    ///
    /// A malformed frame is rejected with an error and leaves every component
    /// as it was; the next valid frame is processed normally.
    pub fn process(&mut self, frame: &Frame) -> Result<FrameReport, FrameError> {
        let detection = match self.detector.process(frame) {
            Ok(detection) => detection,
            Err(e) => {
                tracing::warn!("Rejected frame: {e}");
                if let Some(ref log) = self.activity {
                    log.record_frame_rejected();
                }
                return Err(e);
            }
        };

        let fps = self.fps.sample();
        let action = self.recorder.update(frame, detection.change.percent);

        if let Some(ref log) = self.activity {
            log.record_frame();
            if detection.change.percent >= self.threshold_percent {
                log.record_motion_frame();
            }
            match &action {
                RecorderAction::Started { .. } => {
                    log.record_recording_started();
                    log.record_frame_recorded();
                }
                RecorderAction::Writing => log.record_frame_recorded(),
                RecorderAction::Stopped(_) => log.record_recording_completed(),
                RecorderAction::SinkFailed { closed, .. } => {
                    log.record_sink_failure();
                    if closed.is_some() {
                        log.record_recording_completed();
                    }
                }
                RecorderAction::Idle => {}
            }
        }

        Ok(FrameReport {
            change: detection.change,
            state: self.recorder.state(),
            action,
            fps,
            warming_up: detection.warming_up,
        })
    }

    /// Stop any recording in progress regardless of the window. Call on
    /// shutdown.
    pub fn close(&mut self) -> Option<SessionSummary> {
        let summary = self.recorder.close();
        if summary.is_some() {
            if let Some(ref log) = self.activity {
                log.record_recording_completed();
            }
        }
        summary
    }
}
