//! Uncompressed YUV4MPEG2 file output.
//!
//! Grayscale frames are stored as a single luma plane (`Cmono`). RGB frames
//! are converted to studio-range BT.601 YCbCr without chroma subsampling
//! (`C444`). Any player built on ffmpeg reads these files directly.

use super::{SinkError, SinkSpec, VideoSink, VideoWriter};
use crate::source::{Frame, PixelFormat};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// File extension of written recordings.
pub const EXTENSION: &str = "y4m";

/// Writes each recording to `<dir>/<identifier>.y4m`.
#[derive(Debug, Clone)]
pub struct Y4mSink {
    dir: PathBuf,
}

impl Y4mSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// First free path for `identifier`, adding `_1`, `_2`, ... on collision.
    fn free_path(&self, identifier: &str) -> PathBuf {
        let mut path = self.dir.join(format!("{identifier}.{EXTENSION}"));
        let mut suffix = 1;
        while path.exists() {
            path = self.dir.join(format!("{identifier}_{suffix}.{EXTENSION}"));
            suffix += 1;
        }
        path
    }
}

impl VideoSink for Y4mSink {
    type Writer = Y4mWriter;

    fn open(&mut self, spec: &SinkSpec) -> Result<Y4mWriter, SinkError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| SinkError::Unavailable(e.to_string()))?;

        let path = self.free_path(&spec.identifier);
        let file = File::create(&path).map_err(|e| SinkError::Unavailable(e.to_string()))?;
        let mut out = BufWriter::new(file);

        let (num, den) = rate_fraction(spec.frame_rate);
        let colorspace = match spec.format {
            PixelFormat::Gray8 => "mono",
            PixelFormat::Rgb24 => "444",
        };
        writeln!(
            out,
            "YUV4MPEG2 W{} H{} F{num}:{den} Ip A1:1 C{colorspace}",
            spec.shape.width, spec.shape.height
        )
        .map_err(|e| SinkError::Unavailable(e.to_string()))?;

        Ok(Y4mWriter {
            out: Some(out),
            path,
            spec: spec.clone(),
            frames: 0,
        })
    }
}

/// An open `.y4m` file.
pub struct Y4mWriter {
    out: Option<BufWriter<File>>,
    path: PathBuf,
    spec: SinkSpec,
    frames: u64,
}

impl Y4mWriter {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Frames written so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl VideoWriter for Y4mWriter {
    fn write(&mut self, frame: &Frame) -> Result<(), SinkError> {
        if frame.shape() != self.spec.shape || frame.format() != self.spec.format {
            return Err(SinkError::Write(format!(
                "frame {} {:?} does not match recording {} {:?}",
                frame.shape(),
                frame.format(),
                self.spec.shape,
                self.spec.format
            )));
        }

        let out = self
            .out
            .as_mut()
            .ok_or_else(|| SinkError::Write("recording already closed".to_string()))?;

        out.write_all(b"FRAME\n")
            .map_err(|e| SinkError::Write(e.to_string()))?;
        match frame.format() {
            PixelFormat::Gray8 => out.write_all(frame.data()),
            PixelFormat::Rgb24 => out.write_all(&rgb_to_planar_ycbcr(frame.data())),
        }
        .map_err(|e| SinkError::Write(e.to_string()))?;

        self.frames += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        if let Some(mut out) = self.out.take() {
            out.flush().map_err(|e| SinkError::Close(e.to_string()))?;
        }
        Ok(())
    }

    fn location(&self) -> Option<PathBuf> {
        Some(self.path.clone())
    }
}

/// Express a frame rate as a reduced fraction with millihertz precision.
fn rate_fraction(rate: f64) -> (u64, u64) {
    let num = (rate * 1000.0).round().max(1.0) as u64;
    let den = 1000;
    let g = gcd(num, den);
    (num / g, den / g)
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Convert interleaved RGB to planar Y, Cb, Cr.
fn rgb_to_planar_ycbcr(rgb: &[u8]) -> Vec<u8> {
    let pixels = rgb.len() / 3;
    let mut planes = vec![0u8; pixels * 3];
    let (y_plane, chroma) = planes.split_at_mut(pixels);
    let (cb_plane, cr_plane) = chroma.split_at_mut(pixels);

    for (i, px) in rgb.chunks_exact(3).enumerate() {
        let (r, g, b) = (px[0] as i32, px[1] as i32, px[2] as i32);
        y_plane[i] = (((66 * r + 129 * g + 25 * b + 128) >> 8) + 16) as u8;
        cb_plane[i] = (((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128) as u8;
        cr_plane[i] = (((112 * r - 94 * g - 18 * b + 128) >> 8) + 128) as u8;
    }

    planes
}
