//! Configuration management for the fraud dashboard

use crate::models::explainer::DEFAULT_EXPLAINED_FEATURES;
use crate::types::alert::RiskLevelThresholds;
use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Where the active configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// The named file did not exist
    Defaults(PathBuf),
}

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub model: ModelConfig,
    pub detection: DetectionConfig,
    pub monitor: MonitorConfig,
    pub alerts: AlertsConfig,
    pub logging: LoggingConfig,
}

/// Model artifact configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// JSON manifest naming the ONNX file and its ordered feature names
    pub bundle_path: String,
    /// Number of threads for ONNX inference (default: 1)
    pub onnx_threads: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            bundle_path: "model/bundle.json".to_string(),
            onnx_threads: 1,
        }
    }
}

/// Detection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Fraud probability strictly above this is labelled fraud
    pub threshold: f64,
    /// Explain fraud verdicts
    pub explain: bool,
    /// Maximum contributions per explanation
    pub explain_features: usize,
    /// Risk level classification thresholds
    pub risk_levels: RiskLevelThresholds,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            explain: true,
            explain_features: DEFAULT_EXPLAINED_FEATURES,
            risk_levels: RiskLevelThresholds::default(),
        }
    }
}

/// Spreadsheet monitoring configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Pause after every row and between re-reads
    pub poll_interval_secs: u64,
    /// Rows shown in the "latest transactions" preview
    pub preview_rows: usize,
    /// Replay every row on every pass instead of only rows not yet seen
    pub reprocess_all: bool,
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            preview_rows: 5,
            reprocess_all: false,
        }
    }
}

/// Alert channel configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    pub speech: SpeechConfig,
    /// Publish alerts to NATS when set
    pub nats: Option<NatsConfig>,
}

/// Text-to-speech announcement
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub enabled: bool,
    /// Program that speaks its last argument (`espeak`, `say`, ...)
    pub command: String,
    /// Extra arguments placed before the phrase
    pub args: Vec<String>,
    pub phrase: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: "espeak".to_string(),
            args: Vec::new(),
            phrase: "Alert! Fraudulent transaction detected!".to_string(),
        }
    }
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for outgoing fraud alerts
    #[serde(default = "default_alert_subject")]
    pub subject: String,
}

fn default_alert_subject() -> String {
    "fraud.alerts".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    ///
    /// Nothing is logged here; callers report the source once logging is up.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<(Self, ConfigSource)> {
        let path = path.as_ref();
        if path.exists() {
            Ok((Self::load_from_path(path)?, ConfigSource::File(path.to_path_buf())))
        } else {
            Ok((Self::default(), ConfigSource::Defaults(path.to_path_buf())))
        }
    }

    /// Reject values the detector cannot work with
    pub fn validate(&self) -> Result<()> {
        let threshold = self.detection.threshold;
        if !(0.0..=1.0).contains(&threshold) {
            anyhow::bail!("detection.threshold must be within [0, 1], got {threshold}");
        }
        if self.detection.explain_features == 0 {
            anyhow::bail!("detection.explain_features must be at least 1");
        }
        if self.model.onnx_threads == 0 {
            anyhow::bail!("model.onnx_threads must be at least 1");
        }
        Ok(())
    }
}
