//! Activity counters for the recorder.
//!
//! Tracks how many frames were seen, how many carried motion and how many
//! recordings were made, so `motion-recorder status` can report on a running
//! or past session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Activity statistics for the current session.
#[derive(Debug)]
pub struct ActivityLog {
    /// Frames run through the detector
    frames_processed: AtomicU64,
    /// Frames whose change reached the threshold
    motion_frames: AtomicU64,
    /// Frames written to recordings
    frames_recorded: AtomicU64,
    recordings_started: AtomicU64,
    recordings_completed: AtomicU64,
    /// Sink open or write failures
    sink_failures: AtomicU64,
    /// Frames rejected for a wrong shape
    frames_rejected: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self {
            frames_processed: AtomicU64::new(0),
            motion_frames: AtomicU64::new(0),
            frames_recorded: AtomicU64::new(0),
            recordings_started: AtomicU64::new(0),
            recordings_completed: AtomicU64::new(0),
            sink_failures: AtomicU64::new(0),
            frames_rejected: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a log that accumulates on top of previously saved totals.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!("Could not load previous activity stats: {e}");
        }

        log
    }

    pub fn record_frame(&self) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_motion_frame(&self) {
        self.motion_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_recorded(&self) {
        self.frames_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_recording_started(&self) {
        self.recordings_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_recording_completed(&self) {
        self.recordings_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sink_failure(&self) {
        self.sink_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_rejected(&self) {
        self.frames_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> ActivityStats {
        ActivityStats {
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            motion_frames: self.motion_frames.load(Ordering::Relaxed),
            frames_recorded: self.frames_recorded.load(Ordering::Relaxed),
            recordings_started: self.recordings_started.load(Ordering::Relaxed),
            recordings_completed: self.recordings_completed.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
            frames_rejected: self.frames_rejected.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Frames processed: {}\n\
             - Frames with motion: {}\n\
             - Frames recorded: {}\n\
             - Recordings started: {}\n\
             - Recordings completed: {}\n\
             - Sink failures: {}\n\
             - Frames rejected: {}\n\
             - Session duration: {} seconds",
            stats.frames_processed,
            stats.motion_frames,
            stats.frames_recorded,
            stats.recordings_started,
            stats.recordings_completed,
            stats.sink_failures,
            stats.frames_rejected,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                frames_processed: stats.frames_processed,
                motion_frames: stats.motion_frames,
                frames_recorded: stats.frames_recorded,
                recordings_started: stats.recordings_started,
                recordings_completed: stats.recordings_completed,
                sink_failures: stats.sink_failures,
                frames_rejected: stats.frames_rejected,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.frames_processed
                    .store(persisted.frames_processed, Ordering::Relaxed);
                self.motion_frames
                    .store(persisted.motion_frames, Ordering::Relaxed);
                self.frames_recorded
                    .store(persisted.frames_recorded, Ordering::Relaxed);
                self.recordings_started
                    .store(persisted.recordings_started, Ordering::Relaxed);
                self.recordings_completed
                    .store(persisted.recordings_completed, Ordering::Relaxed);
                self.sink_failures
                    .store(persisted.sink_failures, Ordering::Relaxed);
                self.frames_rejected
                    .store(persisted.frames_rejected, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        for counter in [
            &self.frames_processed,
            &self.motion_frames,
            &self.frames_recorded,
            &self.recordings_started,
            &self.recordings_completed,
            &self.sink_failures,
            &self.frames_rejected,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of activity statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityStats {
    pub frames_processed: u64,
    pub motion_frames: u64,
    pub frames_recorded: u64,
    pub recordings_started: u64,
    pub recordings_completed: u64,
    pub sink_failures: u64,
    pub frames_rejected: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
pub struct PersistedStats {
    pub frames_processed: u64,
    pub motion_frames: u64,
    pub frames_recorded: u64,
    pub recordings_started: u64,
    pub recordings_completed: u64,
    pub sink_failures: u64,
    pub frames_rejected: u64,
    pub last_updated: DateTime<Utc>,
}

/// Thread-safe shared activity log.
pub type SharedActivityLog = Arc<ActivityLog>;

pub fn create_shared_log() -> SharedActivityLog {
    Arc::new(ActivityLog::new())
}

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedActivityLog {
    Arc::new(ActivityLog::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_log_counting() {
        let log = ActivityLog::new();

        log.record_frame();
        log.record_frame();
        log.record_motion_frame();
        log.record_recording_started();

        let stats = log.stats();
        assert_eq!(stats.frames_processed, 2);
        assert_eq!(stats.motion_frames, 1);
        assert_eq!(stats.recordings_started, 1);
        assert_eq!(stats.recordings_completed, 0);
    }

    #[test]
    fn test_activity_log_reset() {
        let log = ActivityLog::new();

        log.record_frame();
        log.record_sink_failure();
        log.reset();

        let stats = log.stats();
        assert_eq!(stats.frames_processed, 0);
        assert_eq!(stats.sink_failures, 0);
    }

    #[test]
    fn test_persistence_accumulates() {
        let path = std::env::temp_dir()
            .join(format!("motion-recorder-activity-{}", std::process::id()))
            .join("activity.json");

        let log = ActivityLog::with_persistence(path.clone());
        log.reset();
        log.record_frame();
        log.record_recording_completed();
        log.save().unwrap();

        let reloaded = ActivityLog::with_persistence(path.clone());
        reloaded.record_frame();
        let stats = reloaded.stats();
        assert_eq!(stats.frames_processed, 2);
        assert_eq!(stats.recordings_completed, 1);

        if let Some(parent) = path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }
    }

    #[test]
    fn test_summary_format() {
        let summary = ActivityLog::new().summary();

        assert!(summary.contains("Frames processed"));
        assert!(summary.contains("Recordings started"));
        assert!(summary.contains("Frames rejected"));
    }
}
