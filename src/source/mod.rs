//! Frame types and the sources that produce them.
//!
//! Sources run a background thread that pushes frames into a bounded
//! channel, so a slow pipeline applies backpressure instead of buffering
//! without limit.

pub mod raw;
pub mod synthetic;
pub mod types;

pub use raw::{CaptureError, RawInput, RawSourceConfig, RawVideoSource};
pub use synthetic::{MovingObject, SyntheticConfig, SyntheticScene, SyntheticSource};
pub use types::{Frame, FrameError, FrameShape, PixelFormat};
