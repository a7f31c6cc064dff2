//! Raw video frames from a file or standard input.
//!
//! The input is a plain concatenation of frames, each exactly
//! `width * height * bytes_per_pixel` bytes, as produced by
//! `ffmpeg -f rawvideo -pix_fmt gray` (or `rgb24`). A reader thread decodes
//! frames into a bounded channel; the channel disconnects at end of input.

use crate::source::types::{Frame, PixelFormat};
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use std::io::Read;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Frames buffered between the reader thread and the consumer.
pub const CHANNEL_CAPACITY: usize = 8;

/// How often a blocked reader re-checks whether it was stopped.
const SEND_POLL: Duration = Duration::from_millis(100);

/// Where raw frames come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawInput {
    Stdin,
    File(PathBuf),
}

impl RawInput {
    /// `-` means standard input, anything else is a path.
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            RawInput::Stdin
        } else {
            RawInput::File(PathBuf::from(arg))
        }
    }
}

impl std::fmt::Display for RawInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawInput::Stdin => write!(f, "stdin"),
            RawInput::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Geometry and pacing of a raw stream.
#[derive(Debug, Clone)]
pub struct RawSourceConfig {
    pub input: RawInput,
    pub width: usize,
    pub height: usize,
    pub format: PixelFormat,
    /// Throttle reading to this many frames per second. `None` reads as fast
    /// as the consumer accepts frames.
    pub pace_fps: Option<f64>,
}

impl RawSourceConfig {
    /// Bytes per frame.
    pub fn frame_len(&self) -> usize {
        self.width * self.height * self.format.bytes_per_pixel()
    }
}

/// Errors raised when starting a frame source.
#[derive(Debug)]
pub enum CaptureError {
    AlreadyRunning,
    /// The source already delivered its whole stream
    Exhausted,
    Io(String),
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureError::AlreadyRunning => write!(f, "Source is already running"),
            CaptureError::Exhausted => write!(f, "Source has already been consumed"),
            CaptureError::Io(msg) => write!(f, "Failed to open input: {msg}"),
        }
    }
}

impl std::error::Error for CaptureError {}

/// Reads raw frames on a background thread.
pub struct RawVideoSource {
    config: RawSourceConfig,
    /// Handed to the reader thread on start; dropping it ends the stream
    sender: Option<Sender<Frame>>,
    receiver: Receiver<Frame>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl RawVideoSource {
    pub fn new(config: RawSourceConfig) -> Self {
        let (sender, receiver) = bounded(CHANNEL_CAPACITY);
        Self {
            config,
            sender: Some(sender),
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    pub fn config(&self) -> &RawSourceConfig {
        &self.config
    }

    /// Open the input and start reading frames in a background thread.
    ///
    /// # Errors
    /// - The source is already running
    /// - The input was already read to the end
    /// - The input file cannot be opened
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CaptureError::AlreadyRunning);
        }
        if self.sender.is_none() {
            return Err(CaptureError::Exhausted);
        }

        let reader: Box<dyn Read + Send> = match &self.config.input {
            RawInput::Stdin => Box::new(std::io::stdin()),
            RawInput::File(path) => Box::new(
                std::fs::File::open(path)
                    .map_err(|e| CaptureError::Io(format!("{}: {e}", path.display())))?,
            ),
        };

        let Some(sender) = self.sender.take() else {
            return Err(CaptureError::Exhausted);
        };
        self.running.store(true, Ordering::SeqCst);

        let running = self.running.clone();
        let config = self.config.clone();

        let handle = thread::spawn(move || {
            let frames = read_frames(reader, &sender, &running, &config);
            tracing::info!(frames, input = %config.input, "Raw input finished");
            running.store(false, Ordering::SeqCst);
        });

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Stop reading.
    ///
    /// A reader blocked on standard input cannot be interrupted; it is
    /// detached and exits after its current read.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            if handle.is_finished() || !matches!(self.config.input, RawInput::Stdin) {
                let _ = handle.join();
            }
        }
    }

    /// Check if the reader thread is still delivering frames.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the receiver for frames. It disconnects at end of input.
    pub fn receiver(&self) -> &Receiver<Frame> {
        &self.receiver
    }

    /// Try to receive a frame without blocking.
    pub fn try_recv(&self) -> Option<Frame> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for RawVideoSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Read whole frames until end of input, an error, or a stop request.
/// Returns the number of frames delivered.
fn read_frames(
    mut reader: impl Read,
    sender: &Sender<Frame>,
    running: &AtomicBool,
    config: &RawSourceConfig,
) -> u64 {
    let frame_len = config.frame_len();
    let pace = config
        .pace_fps
        .filter(|fps| fps.is_finite() && *fps > 0.0)
        .map(|fps| Duration::from_secs_f64(1.0 / fps));
    let mut delivered = 0;

    while running.load(Ordering::SeqCst) {
        let mut buf = vec![0u8; frame_len];
        match read_frame(&mut reader, &mut buf) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                tracing::error!("Raw input read failed: {e}");
                break;
            }
        }

        let mut pending = match Frame::new(config.width, config.height, config.format, buf) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!("Invalid raw frame: {e}");
                break;
            }
        };

        loop {
            match sender.send_timeout(pending, SEND_POLL) {
                Ok(()) => break,
                Err(SendTimeoutError::Timeout(frame)) => {
                    if !running.load(Ordering::SeqCst) {
                        return delivered;
                    }
                    pending = frame;
                }
                Err(SendTimeoutError::Disconnected(_)) => return delivered,
            }
        }
        delivered += 1;

        if let Some(interval) = pace {
            thread::sleep(interval);
        }
    }

    delivered
}

/// Fill `buf` with one frame. `Ok(false)` on a clean end of input; a stream
/// that ends inside a frame is an error.
fn read_frame(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("input ended {filled} bytes into a {} byte frame", buf.len()),
                ))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, bytes: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "motion-recorder-raw-{name}-{}.raw",
            std::process::id()
        ));
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn gray_config(input: RawInput) -> RawSourceConfig {
        RawSourceConfig {
            input,
            width: 4,
            height: 2,
            format: PixelFormat::Gray8,
            pace_fps: None,
        }
    }

    #[test]
    fn test_input_from_arg() {
        assert_eq!(RawInput::from_arg("-"), RawInput::Stdin);
        assert_eq!(
            RawInput::from_arg("clip.raw"),
            RawInput::File(PathBuf::from("clip.raw"))
        );
    }

    #[test]
    fn test_reads_whole_frames_until_eof() {
        let mut bytes = Vec::new();
        for value in [10u8, 20, 30] {
            bytes.extend(std::iter::repeat(value).take(8));
        }
        // Trailing partial frame is dropped
        bytes.extend([99u8; 3]);
        let path = temp_file("frames", &bytes);

        let mut source = RawVideoSource::new(gray_config(RawInput::File(path.clone())));
        source.start().unwrap();

        let frames: Vec<Frame> = source.receiver().iter().collect();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1].data(), &[20u8; 8]);
        assert_eq!(frames[2].width(), 4);

        source.stop();
        assert!(!source.is_running());
        assert!(matches!(source.start(), Err(CaptureError::Exhausted)));

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let missing = std::env::temp_dir().join("motion-recorder-raw-does-not-exist.raw");
        let mut source = RawVideoSource::new(gray_config(RawInput::File(missing)));

        assert!(matches!(source.start(), Err(CaptureError::Io(_))));
        assert!(!source.is_running());
    }

    #[test]
    fn test_read_frame_partial() {
        let mut buf = [0u8; 4];
        let mut short: &[u8] = &[1, 2];
        assert!(read_frame(&mut short, &mut buf).is_err());

        let mut empty: &[u8] = &[];
        assert!(!read_frame(&mut empty, &mut buf).unwrap());
    }

    #[test]
    fn test_frame_len() {
        let mut config = gray_config(RawInput::Stdin);
        assert_eq!(config.frame_len(), 8);
        config.format = PixelFormat::Rgb24;
        assert_eq!(config.frame_len(), 24);
    }
}
