//! Configuration for the motion recorder.

use crate::core::background::BackgroundConfig;
use crate::core::ema::Ema;
use crate::core::morphology::KernelShape;
use crate::core::recorder::RecorderConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for the recorder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Motion detection tuning
    pub detector: DetectorConfig,

    /// Recording window and output
    pub recording: RecordingConfig,

    /// Frame rate monitor smoothing
    pub rate: RateConfig,

    /// Path for storing the activity log
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("motion-recorder");

        Self {
            detector: DetectorConfig::default(),
            recording: RecordingConfig {
                output_dir: data_dir.join("recordings"),
                ..RecordingConfig::default()
            },
            rate: RateConfig::default(),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("motion-recorder")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.recording.output_dir)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Check every value the pipeline depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.detector.validate()?;
        self.recorder_config().validate()?;
        Ema::new(self.rate.smooth_coef)?;
        Ok(())
    }

    /// State machine settings derived from this configuration.
    pub fn recorder_config(&self) -> RecorderConfig {
        RecorderConfig {
            threshold_percent: self.detector.threshold_percent,
            window: self.recording.window,
            frame_rate: self.recording.frame_rate,
        }
    }
}

/// Motion detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Change percentage that starts a recording
    pub threshold_percent: f64,
    /// Side length of the opening structuring element
    pub kernel_size: usize,
    pub kernel_shape: KernelShape,
    /// Treat shadows cast on the background as background
    pub detect_shadows: bool,
    /// Frames the background learning rate averages over
    pub history: u32,
    /// Squared Mahalanobis distance for a background match
    pub var_threshold: f32,
    /// Frames at the start of a session whose change is reported as zero
    pub warmup_frames: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        let background = BackgroundConfig::default();
        Self {
            threshold_percent: 10.0,
            kernel_size: 4,
            kernel_shape: KernelShape::Ellipse,
            detect_shadows: background.detect_shadows,
            history: background.history,
            var_threshold: background.var_threshold,
            warmup_frames: 0,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kernel_size == 0 {
            return Err(ConfigError::Invalid(
                "kernel size must be at least 1".to_string(),
            ));
        }
        if self.history == 0 {
            return Err(ConfigError::Invalid(
                "background history must be at least 1 frame".to_string(),
            ));
        }
        if !(self.var_threshold.is_finite() && self.var_threshold > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "variance threshold must be positive, got {}",
                self.var_threshold
            )));
        }
        Ok(())
    }

    pub fn background(&self) -> BackgroundConfig {
        BackgroundConfig {
            history: self.history,
            var_threshold: self.var_threshold,
            detect_shadows: self.detect_shadows,
        }
    }
}

/// Recording output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// How long recording continues after the last triggering frame
    #[serde(with = "duration_serde")]
    pub window: Duration,
    /// Playback rate written into recordings
    pub frame_rate: f64,
    /// Directory receiving recordings and their manifests
    pub output_dir: PathBuf,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(5),
            frame_rate: 14.0,
            output_dir: PathBuf::from("recordings"),
        }
    }
}

/// Frame rate monitor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateConfig {
    pub smooth_coef: f64,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self { smooth_coef: 0.6 }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as fractional seconds.
mod duration_serde {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}
