//! Display configuration
//!
//! A static set of named options read once at startup from a TOML file.
//! Every field has a default, so an empty file (or no file) is valid.

use rsd_adapters::SensorFilter;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub panel: PanelConfig,
    pub timing: TimingConfig,
    pub sensors: SensorConfig,
    pub failures: FailureConfig,
    pub messages: MessageConfig,
    /// Log filter used when `RUST_LOG` is not set
    pub log_level: Option<String>,
}

impl DisplayConfig {
    /// Read and validate a TOML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parse and validate TOML text
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: DisplayConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.panel.width == 0 || self.panel.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "panel size {}x{} must be non-zero",
                self.panel.width, self.panel.height
            )));
        }
        if self.timing.refresh_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "timing.refresh_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.failures.max_consecutive_render_failures == 0 {
            return Err(ConfigError::Invalid(
                "failures.max_consecutive_render_failures must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }
}

/// Which physical panel driver to open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelBackend {
    #[default]
    Sh1106,
    /// Frames are kept in memory only (headless runs, tests)
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    pub width: u32,
    pub height: u32,
    pub backend: PanelBackend,
    pub i2c_bus: String,
    pub i2c_address: u8,
    /// Font name, see [`crate::surface::font_by_name`]
    pub font: String,
    /// First visible RAM column (the SH1106 has 132 columns for 128 pixels)
    pub column_offset: u8,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            width: 128,
            height: 64,
            backend: PanelBackend::Sh1106,
            i2c_bus: "/dev/i2c-1".to_string(),
            i2c_address: 0x3C,
            font: "6x10".to_string(),
            column_offset: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub refresh_interval_ms: u64,
    pub error_backoff_ms: u64,
    pub startup_delay_ms: u64,
    pub lap_notice_ttl_ms: u64,
    pub burn_in_after_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 2000,
            error_backoff_ms: 5000,
            startup_delay_ms: 15_000,
            lap_notice_ttl_ms: 5000,
            burn_in_after_secs: 60,
        }
    }
}

impl TimingConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn lap_notice_ttl(&self) -> Duration {
        Duration::from_millis(self.lap_notice_ttl_ms)
    }

    pub fn burn_in_after(&self) -> Duration {
        Duration::from_secs(self.burn_in_after_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub voltage_only: bool,
    pub min_voltage: Option<f64>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub show_current: bool,
    pub voltage_decimals: usize,
    pub current_decimals: usize,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            voltage_only: true,
            min_voltage: None,
            include: Vec::new(),
            exclude: Vec::new(),
            show_current: true,
            voltage_decimals: 2,
            current_decimals: 1,
        }
    }
}

impl SensorConfig {
    pub fn filter(&self) -> SensorFilter {
        SensorFilter {
            voltage_only: self.voltage_only,
            min_voltage: self.min_voltage,
            include: self.include.clone(),
            exclude: self.exclude.clone(),
        }
    }
}

/// What to draw once commits keep failing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatedFailurePolicy {
    /// Two small strings, the burn-in guard layout
    #[default]
    Minimal,
    /// An empty frame
    Blank,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailureConfig {
    pub max_consecutive_render_failures: u32,
    pub on_repeated_failure: RepeatedFailurePolicy,
}

impl Default for FailureConfig {
    fn default() -> Self {
        Self {
            max_consecutive_render_failures: 5,
            on_repeated_failure: RepeatedFailurePolicy::Minimal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageConfig {
    pub title: String,
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            title: "Voltage Monitor".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = DisplayConfig::from_toml("").unwrap();
        assert_eq!(config, DisplayConfig::default());
        assert_eq!(config.timing.refresh_interval(), Duration::from_secs(2));
        assert_eq!(config.timing.lap_notice_ttl(), Duration::from_secs(5));
        assert_eq!(config.panel.i2c_address, 0x3C);
        assert_eq!(config.log_level(), "info");
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = DisplayConfig::from_toml(
            r#"
            log_level = "debug"

            [panel]
            backend = "memory"
            i2c_address = 61

            [sensors]
            min_voltage = 0.1
            exclude = ["Ambient"]

            [failures]
            on_repeated_failure = "blank"
            "#,
        )
        .unwrap();
        assert_eq!(config.panel.backend, PanelBackend::Memory);
        assert_eq!(config.panel.i2c_address, 0x3D);
        assert_eq!(config.panel.width, 128);
        assert_eq!(config.sensors.min_voltage, Some(0.1));
        assert!(config.sensors.voltage_only);
        assert_eq!(config.failures.on_repeated_failure, RepeatedFailurePolicy::Blank);
        assert_eq!(config.failures.max_consecutive_render_failures, 5);
        assert_eq!(config.log_level(), "debug");

        let filter = config.sensors.filter();
        assert_eq!(filter.exclude, vec!["Ambient".to_string()]);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = DisplayConfig::from_toml("[panel]\nwidth = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = DisplayConfig::from_toml("[timing]\nrefresh_interval_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = DisplayConfig::from_toml("[panel]\nwidth = \"wide\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = DisplayConfig::load("/nonexistent/rsd.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
