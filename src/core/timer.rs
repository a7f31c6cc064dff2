//! Countdown timer backing the recording hysteresis window.

use crate::core::clock::Clock;
use std::time::Duration;

/// Single countdown window.
///
/// `start` arms the window from the current clock reading; calling it again
/// while armed restarts the window from the new reading rather than adding
/// to it. An unarmed timer reports itself as expired. Expiry does not disarm
/// the timer: it stays expired until `start` is called again.
#[derive(Debug, Clone)]
pub struct RecordingTimer<C: Clock> {
    clock: C,
    started_at: Option<Duration>,
    timeout: Duration,
}

impl<C: Clock> RecordingTimer<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            started_at: None,
            timeout: Duration::ZERO,
        }
    }

    /// Arm (or re-arm) the window with the given timeout.
    pub fn start(&mut self, timeout: Duration) {
        self.started_at = Some(self.clock.now());
        self.timeout = timeout;
    }

    /// Disarm the window so the timer reads as expired.
    pub fn cancel(&mut self) {
        self.started_at = None;
    }

    /// Whether the window has elapsed: `now - start >= timeout`.
    pub fn is_expired(&self) -> bool {
        match self.started_at {
            None => true,
            Some(start) => self.clock.now().saturating_sub(start) >= self.timeout,
        }
    }

    /// Time left before expiry, zero when expired or never started.
    pub fn remaining(&self) -> Duration {
        match self.started_at {
            None => Duration::ZERO,
            Some(start) => {
                let elapsed = self.clock.now().saturating_sub(start);
                self.timeout.saturating_sub(elapsed)
            }
        }
    }

    /// The timeout of the current (or last) window.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;

    #[test]
    fn test_expired_before_start() {
        let timer = RecordingTimer::new(ManualClock::new());
        assert!(timer.is_expired());
        assert_eq!(timer.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_window_expires_after_timeout() {
        let clock = ManualClock::new();
        let mut timer = RecordingTimer::new(clock.clone());

        timer.start(Duration::from_secs_f64(5.0));
        assert!(!timer.is_expired());

        clock.advance_secs(4.99);
        assert!(!timer.is_expired());

        clock.advance_secs(0.02);
        assert!(timer.is_expired());
    }

    #[test]
    fn test_boundary_counts_as_expired() {
        let clock = ManualClock::new();
        let mut timer = RecordingTimer::new(clock.clone());

        timer.start(Duration::from_secs(5));
        clock.advance(Duration::from_secs(5));
        assert!(timer.is_expired());
    }

    #[test]
    fn test_restart_resets_instead_of_accumulating() {
        let clock = ManualClock::new();
        let mut timer = RecordingTimer::new(clock.clone());

        timer.start(Duration::from_secs(5));
        clock.advance(Duration::from_secs(3));
        timer.start(Duration::from_secs(5));
        assert_eq!(timer.timeout(), Duration::from_secs(5));
        assert_eq!(timer.remaining(), Duration::from_secs(5));

        clock.advance(Duration::from_secs(4));
        assert!(!timer.is_expired());

        clock.advance(Duration::from_secs(1));
        assert!(timer.is_expired());
    }

    #[test]
    fn test_stays_expired_until_restarted() {
        let clock = ManualClock::new();
        let mut timer = RecordingTimer::new(clock.clone());

        timer.start(Duration::from_secs(1));
        clock.advance(Duration::from_secs(2));
        assert!(timer.is_expired());
        clock.advance(Duration::from_secs(60));
        assert!(timer.is_expired());

        timer.start(Duration::from_secs(1));
        assert!(!timer.is_expired());
    }

    #[test]
    fn test_cancel() {
        let mut timer = RecordingTimer::new(ManualClock::new());
        timer.start(Duration::from_secs(5));
        timer.cancel();
        assert!(timer.is_expired());
    }
}
