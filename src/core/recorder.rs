//! Recording state machine.
//!
//! Turns the per-frame change metric into recording sessions. A frame whose
//! change reaches the threshold opens a session when idle and re-arms the
//! hysteresis window; every frame inside the window is written; the first
//! frame after the window closes the session.
//!
//! The state is derived from whether a session is open, so "recording" and
//! "session open" can never disagree.

use crate::config::ConfigError;
use crate::core::clock::Clock;
use crate::core::timer::RecordingTimer;
use crate::sink::{SinkError, SinkSpec, VideoSink, VideoWriter};
use crate::source::Frame;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::path::PathBuf;
use std::time::Duration;

/// Format of the timestamp-derived recording identifiers.
pub const IDENTIFIER_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Recording state reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecorderState {
    Idle,
    Recording,
}

impl std::fmt::Display for RecorderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecorderState::Idle => write!(f, "idle"),
            RecorderState::Recording => write!(f, "recording"),
        }
    }
}

/// Thresholds and output parameters of the state machine.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Change percentage that triggers recording
    pub threshold_percent: f64,
    /// Hysteresis window re-armed by every triggering frame
    pub window: Duration,
    /// Playback rate of written recordings
    pub frame_rate: f64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            threshold_percent: 10.0,
            window: Duration::from_secs(5),
            frame_rate: 14.0,
        }
    }
}

impl RecorderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=100.0).contains(&self.threshold_percent) {
            return Err(ConfigError::Invalid(format!(
                "change threshold must be within [0, 100], got {}",
                self.threshold_percent
            )));
        }
        if self.window.is_zero() {
            return Err(ConfigError::Invalid(
                "recording window must be positive".to_string(),
            ));
        }
        if !(self.frame_rate.is_finite() && self.frame_rate > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "frame rate must be positive, got {}",
                self.frame_rate
            )));
        }
        Ok(())
    }
}

/// What the state machine did with a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum RecorderAction {
    /// Nothing to do
    Idle,
    /// A new session was opened and the frame written to it
    Started { identifier: String },
    /// The frame was appended to the open session
    Writing,
    /// The window elapsed and the session was closed
    Stopped(SessionSummary),
    /// The sink failed; the machine is idle. `closed` holds the session that
    /// was torn down, if one was open.
    SinkFailed {
        error: SinkError,
        closed: Option<SessionSummary>,
    },
}

/// Statistics of a finished recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub identifier: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub frames_written: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<PathBuf>,
    /// Highest change percentage among written frames
    pub peak_change: f64,
    pub mean_change: f64,
    pub change_std_dev: f64,
    /// Set when the sink reported an error while finalizing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_error: Option<String>,
}

impl SessionSummary {
    pub fn duration_secs(&self) -> f64 {
        (self.ended_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

/// An open recording. The writer is closed when the session is finished or
/// dropped, whichever comes first.
pub struct RecordingSession<W: VideoWriter> {
    writer: W,
    identifier: String,
    started_at: DateTime<Utc>,
    last_frame_at: DateTime<Utc>,
    changes: Vec<f64>,
    closed: bool,
}

impl<W: VideoWriter> RecordingSession<W> {
    fn new(writer: W, identifier: String, started_at: DateTime<Utc>) -> Self {
        Self {
            writer,
            identifier,
            started_at,
            last_frame_at: started_at,
            changes: Vec::new(),
            closed: false,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn frames_written(&self) -> u64 {
        self.changes.len() as u64
    }

    fn write(&mut self, frame: &Frame, change: f64) -> Result<(), SinkError> {
        self.writer.write(frame)?;
        self.changes.push(change);
        self.last_frame_at = frame.timestamp;
        Ok(())
    }

    fn finish(mut self) -> SessionSummary {
        self.closed = true;
        let close_error = self.writer.close().err().map(|e| e.to_string());

        let (peak_change, mean_change, change_std_dev) = if self.changes.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            let std_dev = Statistics::std_dev(self.changes.iter());
            (
                Statistics::max(self.changes.iter()),
                Statistics::mean(self.changes.iter()),
                if std_dev.is_nan() { 0.0 } else { std_dev },
            )
        };

        SessionSummary {
            identifier: self.identifier.clone(),
            started_at: self.started_at,
            ended_at: self.last_frame_at,
            frames_written: self.changes.len() as u64,
            location: self.writer.location(),
            peak_change,
            mean_change,
            change_std_dev,
            close_error,
        }
    }
}

impl<W: VideoWriter> Drop for RecordingSession<W> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.writer.close() {
                tracing::warn!(identifier = %self.identifier, "Failed to close dropped recording: {e}");
            }
        }
    }
}

/// IDLE/RECORDING state machine driving a [`VideoSink`].
pub struct Recorder<S: VideoSink, C: Clock> {
    config: RecorderConfig,
    sink: S,
    timer: RecordingTimer<C>,
    session: Option<RecordingSession<S::Writer>>,
}

impl<S: VideoSink, C: Clock> Recorder<S, C> {
    pub fn new(config: RecorderConfig, sink: S, clock: C) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            sink,
            timer: RecordingTimer::new(clock),
            session: None,
        })
    }

    pub fn state(&self) -> RecorderState {
        if self.session.is_some() {
            RecorderState::Recording
        } else {
            RecorderState::Idle
        }
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// The open session, if recording.
    pub fn session(&self) -> Option<&RecordingSession<S::Writer>> {
        self.session.as_ref()
    }

    /// Time left in the hysteresis window.
    pub fn remaining_window(&self) -> Duration {
        self.timer.remaining()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Feed one frame and its change percentage.
    ///
    /// 1. A change at or above the threshold opens a session if idle and
    ///    re-arms the window.
    /// 2. While the window runs the frame is written.
    /// 3. Once the window has elapsed the session is closed.
    pub fn update(&mut self, frame: &Frame, change: f64) -> RecorderAction {
        let mut opened = None;

        if change >= self.config.threshold_percent {
            if self.session.is_none() {
                match self.open_session(frame) {
                    Ok(session) => {
                        opened = Some(session.identifier.clone());
                        self.session = Some(session);
                    }
                    Err(error) => {
                        tracing::warn!("Could not start recording: {error}");
                        return RecorderAction::SinkFailed {
                            error,
                            closed: None,
                        };
                    }
                }
            }
            self.timer.start(self.config.window);
        }

        if !self.timer.is_expired() {
            let Some(session) = self.session.as_mut() else {
                return RecorderAction::Idle;
            };

            if let Err(error) = session.write(frame, change) {
                tracing::error!(identifier = %session.identifier, "Write failed, stopping recording: {error}");
                self.timer.cancel();
                let closed = self.close_session();
                return RecorderAction::SinkFailed { error, closed };
            }

            return match opened {
                Some(identifier) => RecorderAction::Started { identifier },
                None => RecorderAction::Writing,
            };
        }

        match self.close_session() {
            Some(summary) => RecorderAction::Stopped(summary),
            None => RecorderAction::Idle,
        }
    }

    /// Force the machine back to idle, closing any open session regardless
    /// of the window.
    pub fn close(&mut self) -> Option<SessionSummary> {
        self.timer.cancel();
        self.close_session()
    }

    fn open_session(&mut self, frame: &Frame) -> Result<RecordingSession<S::Writer>, SinkError> {
        let identifier = frame
            .timestamp
            .with_timezone(&Local)
            .format(IDENTIFIER_FORMAT)
            .to_string();

        let spec = SinkSpec {
            identifier: identifier.clone(),
            frame_rate: self.config.frame_rate,
            shape: frame.shape(),
            format: frame.format(),
        };
        let writer = self.sink.open(&spec)?;

        tracing::info!(identifier = %identifier, "Recording started");
        Ok(RecordingSession::new(writer, identifier, frame.timestamp))
    }

    fn close_session(&mut self) -> Option<SessionSummary> {
        let summary = self.session.take()?.finish();

        if let Some(ref e) = summary.close_error {
            tracing::error!(identifier = %summary.identifier, "Recording did not close cleanly: {e}");
        }
        tracing::info!(
            identifier = %summary.identifier,
            frames = summary.frames_written,
            peak_change = summary.peak_change,
            "Recording stopped"
        );
        Some(summary)
    }
}
