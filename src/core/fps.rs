//! Smoothed frame-rate measurement.

use crate::config::ConfigError;
use crate::core::clock::Clock;
use crate::core::ema::Ema;
use std::time::Duration;

/// Measures how often `sample` is called.
///
/// Each call feeds `1 / elapsed` into its own EMA filter and returns the
/// smoothed rate rounded to two decimals. The first call only records the
/// timestamp and returns 0.0.
pub struct RateMonitor<C: Clock> {
    clock: C,
    rate: Ema,
    last_sample: Option<Duration>,
}

impl<C: Clock> RateMonitor<C> {
    pub fn new(clock: C, smooth_coef: f64) -> Result<Self, ConfigError> {
        Ok(Self {
            clock,
            rate: Ema::new(smooth_coef)?,
            last_sample: None,
        })
    }

    /// Record a tick and return the smoothed rate in Hz.
    pub fn sample(&mut self) -> f64 {
        let now = self.clock.now();

        if let Some(previous) = self.last_sample.replace(now) {
            let elapsed = now.saturating_sub(previous).as_secs_f64();
            // Two ticks at the same instant carry no rate information
            if elapsed > 0.0 {
                self.rate.update(1.0 / elapsed);
            }
        }

        self.current()
    }

    /// Last smoothed rate without recording a tick.
    pub fn current(&self) -> f64 {
        round2(self.rate.get().unwrap_or(0.0))
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;

    #[test]
    fn test_first_sample_is_zero() {
        let mut fps = RateMonitor::new(ManualClock::new(), 0.6).unwrap();
        assert_eq!(fps.sample(), 0.0);
    }

    #[test]
    fn test_second_sample_reports_interval_rate() {
        let clock = ManualClock::new();
        let mut fps = RateMonitor::new(clock.clone(), 0.6).unwrap();

        fps.sample();
        clock.advance(Duration::from_millis(100));
        let rate = fps.sample();
        assert!((rate - 10.0).abs() < 0.01);
    }

    #[test]
    fn test_smooths_rate_changes() {
        let clock = ManualClock::new();
        let mut fps = RateMonitor::new(clock.clone(), 0.6).unwrap();

        fps.sample();
        clock.advance(Duration::from_millis(100));
        fps.sample();
        clock.advance(Duration::from_millis(50));
        let rate = fps.sample();

        // 0.6 * 10 + 0.4 * 20
        assert!((rate - 14.0).abs() < 0.01);
    }

    #[test]
    fn test_zero_interval_is_skipped() {
        let clock = ManualClock::new();
        let mut fps = RateMonitor::new(clock.clone(), 0.6).unwrap();

        fps.sample();
        assert_eq!(fps.sample(), 0.0);

        clock.advance(Duration::from_millis(250));
        assert!((fps.sample() - 4.0).abs() < 0.01);
    }

    #[test]
    fn test_rounds_to_two_decimals() {
        let clock = ManualClock::new();
        let mut fps = RateMonitor::new(clock.clone(), 0.5).unwrap();

        fps.sample();
        clock.advance(Duration::from_millis(300));
        let rate = fps.sample();
        assert_eq!(rate, 3.33);
    }
}
