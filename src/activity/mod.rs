//! Activity tracking for the motion recorder.
//!
//! Counts what the recorder did so it can be reported and persisted between
//! runs.

pub mod log;

pub use log::{
    create_shared_log, create_shared_log_with_persistence, ActivityLog, ActivityStats,
    PersistedStats, SharedActivityLog,
};
