//! Frame types shared by sources, the detection pipeline and sinks.
//!
//! A frame is an immutable grid of 8-bit pixels. Dimensions are fixed for a
//! session; the pipeline rejects any frame whose shape differs from the first
//! one it saw.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pixel layout of a frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// One byte per pixel, luminance only
    Gray8,
    /// Three bytes per pixel, interleaved R, G, B
    Rgb24,
}

impl PixelFormat {
    /// Bytes used by a single pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb24 => 3,
        }
    }

    /// Parse a format name as given on the command line.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "gray" | "gray8" | "grey" | "mono" => Some(PixelFormat::Gray8),
            "rgb" | "rgb24" => Some(PixelFormat::Rgb24),
            _ => None,
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PixelFormat::Gray8 => write!(f, "gray8"),
            PixelFormat::Rgb24 => write!(f, "rgb24"),
        }
    }
}

/// Width and height of a frame in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameShape {
    pub width: usize,
    pub height: usize,
}

impl FrameShape {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Number of pixels in a frame of this shape.
    pub fn area(&self) -> usize {
        self.width * self.height
    }
}

impl std::fmt::Display for FrameShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A single captured video frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// When the frame was captured
    pub timestamp: DateTime<Utc>,
    shape: FrameShape,
    format: PixelFormat,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap a pixel buffer, checking that its length matches the shape.
    pub fn new(
        width: usize,
        height: usize,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self, FrameError> {
        let expected = width * height * format.bytes_per_pixel();
        if data.len() != expected {
            return Err(FrameError::BufferSize {
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            timestamp: Utc::now(),
            shape: FrameShape::new(width, height),
            format,
            data,
        })
    }

    /// Create a grayscale frame filled with a single intensity.
    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self {
            timestamp: Utc::now(),
            shape: FrameShape::new(width, height),
            format: PixelFormat::Gray8,
            data: vec![value; width * height],
        }
    }

    /// Override the capture timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn width(&self) -> usize {
        self.shape.width
    }

    pub fn height(&self) -> usize {
        self.shape.height
    }

    pub fn shape(&self) -> FrameShape {
        self.shape
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Raw pixel bytes in row-major order.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Luminance of the pixel at index `idx` (row-major), BT.601 weights.
    pub fn luma(&self, idx: usize) -> f32 {
        match self.format {
            PixelFormat::Gray8 => self.data[idx] as f32,
            PixelFormat::Rgb24 => {
                let p = &self.data[idx * 3..idx * 3 + 3];
                0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32
            }
        }
    }
}

/// Errors for malformed frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Frame dimensions differ from the ones established for the session
    InputShape {
        expected: FrameShape,
        actual: FrameShape,
    },
    /// Pixel format differs from the one established for the session
    InputFormat {
        expected: PixelFormat,
        actual: PixelFormat,
    },
    /// Pixel buffer length does not match width, height and format
    BufferSize { expected: usize, actual: usize },
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameError::InputShape { expected, actual } => {
                write!(f, "Frame shape {actual} does not match session shape {expected}")
            }
            FrameError::InputFormat { expected, actual } => {
                write!(f, "Frame format {actual} does not match session format {expected}")
            }
            FrameError::BufferSize { expected, actual } => {
                write!(f, "Frame buffer holds {actual} bytes, expected {expected}")
            }
        }
    }
}

impl std::error::Error for FrameError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_buffer_validation() {
        assert!(Frame::new(4, 2, PixelFormat::Gray8, vec![0; 8]).is_ok());
        assert!(Frame::new(4, 2, PixelFormat::Rgb24, vec![0; 24]).is_ok());

        let err = Frame::new(4, 2, PixelFormat::Rgb24, vec![0; 8]).unwrap_err();
        assert_eq!(
            err,
            FrameError::BufferSize {
                expected: 24,
                actual: 8
            }
        );
    }

    #[test]
    fn test_rgb_luma() {
        let frame = Frame::new(2, 1, PixelFormat::Rgb24, vec![255, 255, 255, 0, 0, 0]).unwrap();
        assert!((frame.luma(0) - 255.0).abs() < 0.01);
        assert!(frame.luma(1).abs() < 0.01);
    }

    #[test]
    fn test_format_names() {
        assert_eq!(PixelFormat::from_name("gray"), Some(PixelFormat::Gray8));
        assert_eq!(PixelFormat::from_name("RGB24"), Some(PixelFormat::Rgb24));
        assert_eq!(PixelFormat::from_name("yuv420p"), None);
    }
}
