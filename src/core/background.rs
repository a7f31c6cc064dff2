//! Adaptive background subtraction.
//!
//! Each pixel keeps a small mixture of Gaussians over its luminance. Modes
//! are ranked by weight; the heaviest modes whose weights add up to
//! `BACKGROUND_RATIO` describe the background. A pixel that falls within
//! `var_threshold` squared standard deviations of one of those modes is
//! background, anything else is foreground. Every frame updates the model, so
//! objects that stop moving are absorbed into the background over time.
//!
//! The first frame seeds one mode per pixel and is reported as all
//! background.

use crate::core::mask::ForegroundMask;
use crate::source::{Frame, FrameError, FrameShape, PixelFormat};
use serde::{Deserialize, Serialize};

/// Maximum number of Gaussian modes per pixel.
const MAX_MODES: usize = 5;

/// Cumulative weight of the modes that count as background.
const BACKGROUND_RATIO: f32 = 0.9;

/// Squared Mahalanobis distance under which a sample updates a mode.
const VAR_THRESHOLD_GEN: f32 = 9.0;

/// Variance given to freshly created modes.
const VAR_INIT: f32 = 15.0;
const VAR_MIN: f32 = 4.0;
const VAR_MAX: f32 = 75.0;

/// Weight decay applied to every mode each frame, scaled by the learning rate.
const COMPLEXITY_REDUCTION: f32 = 0.05;

/// Darkest relative brightness still considered a shadow of the background.
const SHADOW_TAU: f32 = 0.5;

/// Tuning for [`BackgroundModel`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundConfig {
    /// Number of frames the learning rate is averaged over
    pub history: u32,
    /// Squared Mahalanobis distance for a background match
    pub var_threshold: f32,
    /// Classify darker copies of the background as shadows and report them
    /// as background
    pub detect_shadows: bool,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            history: 500,
            var_threshold: 16.0,
            detect_shadows: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Mode {
    weight: f32,
    mean: f32,
    var: f32,
}

/// Classification of a single pixel against the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelClass {
    Background,
    Foreground,
    Shadow,
}

/// Per-pixel mixture-of-Gaussians background model.
pub struct BackgroundModel {
    config: BackgroundConfig,
    shape: Option<FrameShape>,
    format: Option<PixelFormat>,
    modes: Vec<Mode>,
    used: Vec<u8>,
    frames_seen: u64,
}

impl BackgroundModel {
    pub fn new(config: BackgroundConfig) -> Self {
        Self {
            config,
            shape: None,
            format: None,
            modes: Vec::new(),
            used: Vec::new(),
            frames_seen: 0,
        }
    }

    /// Shape established by the first frame, if any.
    pub fn shape(&self) -> Option<FrameShape> {
        self.shape
    }

    /// Number of frames folded into the model.
    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    /// Drop all learned statistics; the next frame seeds a new model and may
    /// have a different shape.
    pub fn reset(&mut self) {
        self.shape = None;
        self.format = None;
        self.modes.clear();
        self.used.clear();
        self.frames_seen = 0;
    }

    /// Classify `frame` against the model, then fold it into the model.
    ///
    /// A frame whose shape or pixel format differs from the established one
    /// is rejected and leaves the model untouched.
    pub fn apply(&mut self, frame: &Frame) -> Result<ForegroundMask, FrameError> {
        let shape = frame.shape();
        match self.shape {
            None => {
                self.seed(frame);
                return Ok(ForegroundMask::empty(shape));
            }
            Some(expected) if expected != shape => {
                return Err(FrameError::InputShape {
                    expected,
                    actual: shape,
                });
            }
            Some(_) => {}
        }
        if let Some(expected) = self.format.filter(|&f| f != frame.format()) {
            return Err(FrameError::InputFormat {
                expected,
                actual: frame.format(),
            });
        }

        self.frames_seen += 1;
        let horizon = (2 * self.frames_seen).min(self.config.history.max(1) as u64);
        let alpha = 1.0 / horizon as f32;

        let mut data = Vec::with_capacity(shape.area());
        for idx in 0..shape.area() {
            let modes = &mut self.modes[idx * MAX_MODES..(idx + 1) * MAX_MODES];
            let class = update_pixel(modes, &mut self.used[idx], frame.luma(idx), alpha, &self.config);
            data.push(class == PixelClass::Foreground);
        }

        Ok(ForegroundMask::from_vec(shape, data))
    }

    fn seed(&mut self, frame: &Frame) {
        let shape = frame.shape();
        self.shape = Some(shape);
        self.format = Some(frame.format());
        self.modes = vec![Mode::default(); shape.area() * MAX_MODES];
        self.used = vec![1; shape.area()];
        for idx in 0..shape.area() {
            self.modes[idx * MAX_MODES] = Mode {
                weight: 1.0,
                mean: frame.luma(idx),
                var: VAR_INIT,
            };
        }
        self.frames_seen = 1;
    }
}

/// Update one pixel's modes with sample `x` and classify it.
fn update_pixel(
    modes: &mut [Mode],
    used: &mut u8,
    x: f32,
    alpha: f32,
    config: &BackgroundConfig,
) -> PixelClass {
    let prune = -alpha * COMPLEXITY_REDUCTION;
    let mut count = *used as usize;
    let mut fits = false;
    let mut background = false;
    let mut total_weight = 0.0;

    for mode in modes[..count].iter_mut() {
        let mut weight = (1.0 - alpha) * mode.weight + prune;

        if !fits {
            let diff = x - mode.mean;
            let dist2 = diff * diff;

            if total_weight < BACKGROUND_RATIO && dist2 < config.var_threshold * mode.var {
                background = true;
            }

            if dist2 < VAR_THRESHOLD_GEN * mode.var {
                fits = true;
                weight += alpha;
                let k = alpha / weight;
                mode.mean += k * diff;
                mode.var = (mode.var + k * (dist2 - mode.var)).clamp(VAR_MIN, VAR_MAX);
            }
        }

        mode.weight = weight.max(0.0);
        total_weight += mode.weight;
    }

    // Drop starved modes and keep the rest sorted heaviest first
    modes[..count].sort_by(|a, b| b.weight.total_cmp(&a.weight));
    while count > 0 && modes[count - 1].weight <= 0.0 {
        count -= 1;
    }
    normalize(&mut modes[..count]);

    if !fits {
        let slot = if count == MAX_MODES { MAX_MODES - 1 } else { count };
        count = slot + 1;

        let weight = if count == 1 {
            1.0
        } else {
            for mode in modes[..slot].iter_mut() {
                mode.weight *= 1.0 - alpha;
            }
            alpha
        };
        modes[slot] = Mode {
            weight,
            mean: x,
            var: VAR_INIT,
        };
        modes[..count].sort_by(|a, b| b.weight.total_cmp(&a.weight));
        normalize(&mut modes[..count]);
    }

    *used = count as u8;

    if background {
        PixelClass::Background
    } else if config.detect_shadows && is_shadow(&modes[..count], x) {
        PixelClass::Shadow
    } else {
        PixelClass::Foreground
    }
}

fn normalize(modes: &mut [Mode]) {
    let total: f32 = modes.iter().map(|m| m.weight).sum();
    if total > 0.0 {
        for mode in modes.iter_mut() {
            mode.weight /= total;
        }
    }
}

/// A shadow is a uniformly darker version of a background mode.
fn is_shadow(modes: &[Mode], x: f32) -> bool {
    let mut total_weight = 0.0;
    for mode in modes {
        if mode.mean > 0.0 {
            let ratio = x / mode.mean;
            if (SHADOW_TAU..=1.0).contains(&ratio) {
                return true;
            }
        }

        total_weight += mode.weight;
        if total_weight > BACKGROUND_RATIO {
            break;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_block(value: u8, block: u8) -> Frame {
        let (w, h) = (32, 24);
        let mut data = vec![value; w * h];
        for y in 8..18 {
            for x in 10..20 {
                data[y * w + x] = block;
            }
        }
        Frame::new(w, h, PixelFormat::Gray8, data).unwrap()
    }

    #[test]
    fn test_static_scene_stays_background() {
        let mut model = BackgroundModel::new(BackgroundConfig::default());
        let frame = Frame::filled(32, 24, 100);

        for _ in 0..50 {
            let mask = model.apply(&frame).unwrap();
            assert_eq!(mask.count(), 0);
        }
        assert_eq!(model.frames_seen(), 50);
    }

    #[test]
    fn test_detects_new_object() {
        let mut model = BackgroundModel::new(BackgroundConfig::default());
        let scene = Frame::filled(32, 24, 100);
        for _ in 0..20 {
            model.apply(&scene).unwrap();
        }

        let mask = model.apply(&frame_with_block(100, 250)).unwrap();
        assert_eq!(mask.count(), 100);
        assert!(mask.get(10, 8));
        assert!(mask.get(19, 17));
        assert!(!mask.get(9, 8));
        assert!(!mask.get(0, 0));
    }

    #[test]
    fn test_absorbs_stationary_object() {
        let config = BackgroundConfig {
            history: 10,
            ..Default::default()
        };
        let mut model = BackgroundModel::new(config);
        let scene = Frame::filled(32, 24, 100);
        for _ in 0..20 {
            model.apply(&scene).unwrap();
        }

        let moved = frame_with_block(100, 250);
        assert!(model.apply(&moved).unwrap().count() > 0);
        for _ in 0..30 {
            model.apply(&moved).unwrap();
        }
        assert_eq!(model.apply(&moved).unwrap().count(), 0);
    }

    #[test]
    fn test_shadow_classification() {
        let scene = Frame::filled(32, 24, 200);
        let shadowed = frame_with_block(200, 140);

        let mut plain = BackgroundModel::new(BackgroundConfig::default());
        let mut tolerant = BackgroundModel::new(BackgroundConfig {
            detect_shadows: true,
            ..Default::default()
        });
        for _ in 0..20 {
            plain.apply(&scene).unwrap();
            tolerant.apply(&scene).unwrap();
        }

        assert_eq!(plain.apply(&shadowed).unwrap().count(), 100);
        assert_eq!(tolerant.apply(&shadowed).unwrap().count(), 0);
    }

    #[test]
    fn test_brighter_object_is_not_a_shadow() {
        let mut model = BackgroundModel::new(BackgroundConfig {
            detect_shadows: true,
            ..Default::default()
        });
        let scene = Frame::filled(32, 24, 100);
        for _ in 0..20 {
            model.apply(&scene).unwrap();
        }

        assert_eq!(model.apply(&frame_with_block(100, 250)).unwrap().count(), 100);
    }

    #[test]
    fn test_rejects_shape_change_without_corrupting_model() {
        let mut model = BackgroundModel::new(BackgroundConfig::default());
        let scene = Frame::filled(32, 24, 100);
        model.apply(&scene).unwrap();

        let err = model.apply(&Frame::filled(16, 16, 100)).unwrap_err();
        assert_eq!(
            err,
            FrameError::InputShape {
                expected: FrameShape::new(32, 24),
                actual: FrameShape::new(16, 16),
            }
        );
        assert_eq!(model.frames_seen(), 1);
        assert_eq!(model.apply(&scene).unwrap().count(), 0);
    }

    #[test]
    fn test_rejects_format_change_at_same_size() {
        let mut model = BackgroundModel::new(BackgroundConfig::default());
        let scene = Frame::filled(4, 2, 100);
        model.apply(&scene).unwrap();

        let rgb = Frame::new(4, 2, PixelFormat::Rgb24, vec![100; 4 * 2 * 3]).unwrap();
        let err = model.apply(&rgb).unwrap_err();
        assert_eq!(
            err,
            FrameError::InputFormat {
                expected: PixelFormat::Gray8,
                actual: PixelFormat::Rgb24,
            }
        );
        assert_eq!(model.frames_seen(), 1);
        assert_eq!(model.apply(&scene).unwrap().count(), 0);
    }

    #[test]
    fn test_reset_allows_new_shape() {
        let mut model = BackgroundModel::new(BackgroundConfig::default());
        model.apply(&Frame::filled(32, 24, 100)).unwrap();
        model.reset();
        assert!(model.apply(&Frame::filled(16, 16, 100)).is_ok());
        assert_eq!(model.shape(), Some(FrameShape::new(16, 16)));
    }
}
