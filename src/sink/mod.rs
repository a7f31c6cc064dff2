//! Video sinks that receive recorded frames.
//!
//! A [`VideoSink`] opens one [`VideoWriter`] per recording session. The
//! recorder owns the writer for the lifetime of the session and closes it
//! exactly once.

pub mod memory;
pub mod y4m;

use crate::source::{Frame, FrameShape, PixelFormat};
use std::path::PathBuf;

pub use memory::{MemorySink, MemoryWriter, SinkEvent};
pub use y4m::{Y4mSink, Y4mWriter};

/// Parameters for opening a recording.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkSpec {
    /// Timestamp-derived name of the recording
    pub identifier: String,
    /// Playback rate written into the output
    pub frame_rate: f64,
    pub shape: FrameShape,
    pub format: PixelFormat,
}

/// Factory for recording outputs.
pub trait VideoSink {
    type Writer: VideoWriter;

    fn open(&mut self, spec: &SinkSpec) -> Result<Self::Writer, SinkError>;
}

/// An open recording.
pub trait VideoWriter {
    fn write(&mut self, frame: &Frame) -> Result<(), SinkError>;

    /// Finish the recording. Calling it again is a no-op.
    fn close(&mut self) -> Result<(), SinkError>;

    /// Where the recording ends up, if it lives on disk.
    fn location(&self) -> Option<PathBuf> {
        None
    }
}

/// Errors raised by sinks and writers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The output could not be opened
    Unavailable(String),
    /// A frame could not be written
    Write(String),
    /// The output could not be finalized
    Close(String),
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::Unavailable(e) => write!(f, "Sink unavailable: {e}"),
            SinkError::Write(e) => write!(f, "Write error: {e}"),
            SinkError::Close(e) => write!(f, "Close error: {e}"),
        }
    }
}

impl std::error::Error for SinkError {}
