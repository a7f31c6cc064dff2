//! Frame to change metric: background subtraction, cleaning, aggregation.

use crate::config::DetectorConfig;
use crate::core::background::BackgroundModel;
use crate::core::contours::{change_metric, ChangeMetric};
use crate::core::mask::ForegroundMask;
use crate::core::morphology::MorphologicalCleaner;
use crate::source::{Frame, FrameError};

/// Result of running one frame through the detector.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Cleaned foreground mask
    pub mask: ForegroundMask,
    pub change: ChangeMetric,
    /// The model is still inside its warm-up period; `change` is zeroed
    pub warming_up: bool,
}

/// Motion detector owning the background model.
pub struct MotionDetector {
    background: BackgroundModel,
    cleaner: MorphologicalCleaner,
    warmup_frames: u32,
    frames: u64,
}

impl MotionDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            background: BackgroundModel::new(config.background()),
            cleaner: MorphologicalCleaner::new(config.kernel_shape, config.kernel_size),
            warmup_frames: config.warmup_frames,
            frames: 0,
        }
    }

    /// Frames accepted so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Classify a frame and measure how much of it changed.
    ///
    /// Frames with the wrong shape are rejected without touching the model.
    pub fn process(&mut self, frame: &Frame) -> Result<Detection, FrameError> {
        let raw = self.background.apply(frame)?;
        let mask = self.cleaner.clean(&raw);
        self.frames += 1;

        let warming_up = self.frames <= self.warmup_frames as u64;
        let change = if warming_up {
            ChangeMetric::default()
        } else {
            change_metric(&mask, frame.shape().area())
        };

        tracing::trace!(
            percent = change.percent,
            regions = change.regions,
            raw_pixels = raw.count(),
            "Frame analysed"
        );

        Ok(Detection {
            mask,
            change,
            warming_up,
        })
    }

    /// Forget the learned background.
    pub fn reset(&mut self) {
        self.background.reset();
        self.frames = 0;
    }
}
