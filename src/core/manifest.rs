//! JSON manifests describing finished recordings.
//!
//! Every closed session gets a `.json` file next to its video, sharing the
//! video's file name, so recordings can be listed and exported without
//! decoding them.

use crate::core::recorder::SessionSummary;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// The current manifest format version.
pub const MANIFEST_VERSION: &str = "1.0";

/// The name of this producer.
pub const PRODUCER_NAME: &str = "motion-recorder";

/// File extension of manifests.
pub const MANIFEST_EXTENSION: &str = "json";

/// Software that produced a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestProducer {
    pub name: String,
    pub version: String,
    /// Unique per recorder process
    pub instance_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

/// Change statistics over the frames written to a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeStats {
    pub peak_percent: f64,
    pub mean_percent: f64,
    pub std_dev_percent: f64,
}

/// Manifest of one recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingManifest {
    pub manifest_version: String,
    pub identifier: String,
    /// First written frame (RFC3339)
    pub start: String,
    /// Last written frame (RFC3339)
    pub end: String,
    pub duration_secs: f64,
    pub frames: u64,
    pub change: ChangeStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<PathBuf>,
    /// Error reported by the sink while finalizing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_error: Option<String>,
    pub producer: ManifestProducer,
    /// When this manifest was written (RFC3339)
    pub written_at: String,
}

/// Builder for recording manifests.
pub struct ManifestBuilder {
    instance_id: Uuid,
    hostname: Option<String>,
}

impl ManifestBuilder {
    /// Create a builder with a fresh instance ID.
    pub fn new() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok());

        Self {
            instance_id: Uuid::new_v4(),
            hostname,
        }
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn build(&self, summary: &SessionSummary) -> RecordingManifest {
        RecordingManifest {
            manifest_version: MANIFEST_VERSION.to_string(),
            identifier: summary.identifier.clone(),
            start: summary.started_at.to_rfc3339(),
            end: summary.ended_at.to_rfc3339(),
            duration_secs: summary.duration_secs(),
            frames: summary.frames_written,
            change: ChangeStats {
                peak_percent: summary.peak_change,
                mean_percent: summary.mean_change,
                std_dev_percent: summary.change_std_dev,
            },
            location: summary.location.clone(),
            close_error: summary.close_error.clone(),
            producer: ManifestProducer {
                name: PRODUCER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                instance_id: self.instance_id.to_string(),
                hostname: self.hostname.clone(),
            },
            written_at: Utc::now().to_rfc3339(),
        }
    }

    /// Build a manifest and write it into `dir`, named after the recording
    /// file when there is one and after the identifier otherwise.
    pub fn write(&self, summary: &SessionSummary, dir: &Path) -> Result<PathBuf, std::io::Error> {
        let manifest = self.build(summary);
        std::fs::create_dir_all(dir)?;

        let stem = summary
            .location
            .as_deref()
            .and_then(|location| location.file_stem())
            .and_then(|stem| stem.to_str())
            .unwrap_or(&manifest.identifier);
        let path = dir.join(format!("{stem}.{MANIFEST_EXTENSION}"));
        let json = serde_json::to_string_pretty(&manifest).map_err(std::io::Error::other)?;
        std::fs::write(&path, json)?;

        tracing::debug!(path = %path.display(), "Wrote recording manifest");
        Ok(path)
    }
}

impl Default for ManifestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Read every manifest in `dir`, oldest first. Files that fail to parse are
/// skipped with a warning.
pub fn load_manifests(dir: &Path) -> Result<Vec<RecordingManifest>, std::io::Error> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut manifests = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(MANIFEST_EXTENSION) {
            continue;
        }

        let content = std::fs::read_to_string(&path)?;
        match serde_json::from_str::<RecordingManifest>(&content) {
            Ok(manifest) => manifests.push(manifest),
            Err(e) => tracing::warn!(path = %path.display(), "Skipping unreadable manifest: {e}"),
        }
    }

    manifests.sort_by(|a, b| a.start.cmp(&b.start).then(a.identifier.cmp(&b.identifier)));
    Ok(manifests)
}
