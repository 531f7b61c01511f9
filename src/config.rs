use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::LapfixError;
use crate::logging::LogConfig;
use crate::synth::{SynthesisOptions, DEFAULT_COLLAPSED_GAP_SECS, DEFAULT_GAP_THRESHOLD_SECS};

/// Largest number of decimals written for distances, altitudes and speeds
pub const MAX_DECIMALS: usize = 9;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Gap collapsing settings
    pub synthesis: SynthesisSettings,

    /// Corrected file output settings
    pub output: OutputSettings,

    /// Logging settings
    pub logging: LogConfig,
}

/// Gap collapsing settings, in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisSettings {
    /// Pauses longer than this are collapsed
    pub gap_threshold_seconds: f64,

    /// Length a collapsed pause is reduced to
    pub collapsed_gap_seconds: f64,
}

/// Corrected file output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Decimals written for distances, altitudes and speeds
    pub decimals: usize,

    /// Suffix appended to the input file stem for the corrected file
    pub suffix: String,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            gap_threshold_seconds: DEFAULT_GAP_THRESHOLD_SECS as f64,
            collapsed_gap_seconds: DEFAULT_COLLAPSED_GAP_SECS as f64,
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            decimals: 2,
            suffix: "_corrected".to_string(),
        }
    }
}

impl SynthesisSettings {
    /// Scan options with the configured durations, at millisecond precision
    pub fn options(&self) -> SynthesisOptions {
        SynthesisOptions {
            gap_threshold: seconds_to_duration(self.gap_threshold_seconds),
            collapsed_gap: seconds_to_duration(self.collapsed_gap_seconds),
        }
    }
}

impl OutputSettings {
    /// Default output path for a corrected copy of `input`
    pub fn corrected_path(&self, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "activity".to_string());
        let extension = input
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| "tcx".to_string());
        input.with_file_name(format!("{}{}.{}", stem, self.suffix, extension))
    }
}

fn seconds_to_duration(seconds: f64) -> Duration {
    Duration::milliseconds((seconds * 1000.0).round() as i64)
}

/// Configuration management implementation
impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let toml_content =
            toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        fs::write(path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lapfix")
            .join("config.toml")
    }

    /// Load from `path`, or from the default location if it exists, or fall
    /// back to defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_path = Self::default_config_path();
                if default_path.exists() {
                    Self::load_from_file(&default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Check value ranges
    pub fn validate(&self) -> std::result::Result<(), LapfixError> {
        let synthesis = &self.synthesis;
        if !(synthesis.collapsed_gap_seconds >= 0.0 && synthesis.collapsed_gap_seconds.is_finite()) {
            return Err(LapfixError::Configuration(format!(
                "collapsed_gap_seconds must be a non-negative number, got {}",
                synthesis.collapsed_gap_seconds
            )));
        }
        if !(synthesis.gap_threshold_seconds > synthesis.collapsed_gap_seconds
            && synthesis.gap_threshold_seconds.is_finite())
        {
            return Err(LapfixError::Configuration(format!(
                "gap_threshold_seconds ({}) must exceed collapsed_gap_seconds ({})",
                synthesis.gap_threshold_seconds, synthesis.collapsed_gap_seconds
            )));
        }
        if self.output.decimals > MAX_DECIMALS {
            return Err(LapfixError::Configuration(format!(
                "decimals must be at most {}, got {}",
                MAX_DECIMALS, self.output.decimals
            )));
        }
        Ok(())
    }
}
