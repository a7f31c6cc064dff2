//! Exponential moving average over a stream of scalars.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};

/// Recursive low-pass filter.
///
/// The first update seeds the value directly. Every later update computes
/// `value = coef * value + (1 - coef) * new`, so a higher coefficient gives
/// more weight to history. The filter has no notion of time between updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ema {
    value: Option<f64>,
    smooth_coef: f64,
}

impl Ema {
    /// Create a filter. The coefficient must lie strictly between 0 and 1.
    pub fn new(smooth_coef: f64) -> Result<Self, ConfigError> {
        if !(smooth_coef > 0.0 && smooth_coef < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "smoothing coefficient must be in (0, 1), got {smooth_coef}"
            )));
        }

        Ok(Self {
            value: None,
            smooth_coef,
        })
    }

    pub fn update(&mut self, new_value: f64) {
        self.value = Some(match self.value {
            None => new_value,
            Some(old) => self.smooth_coef * old + (1.0 - self.smooth_coef) * new_value,
        });
    }

    /// Current smoothed value, `None` until the first update.
    pub fn get(&self) -> Option<f64> {
        self.value
    }

    pub fn smooth_coef(&self) -> f64 {
        self.smooth_coef
    }

    /// Forget the current value.
    pub fn reset(&mut self) {
        self.value = None;
    }
}
