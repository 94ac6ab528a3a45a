use std::path::Path;
use std::time::Duration;

use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::anchor::{parse_anchor_time, parse_timezone};
use crate::error::ConfigError;
use crate::host::HostOptions;
use crate::indicator::DEFAULT_LOOKBACK_CAP;
use crate::model::{AnchorSettings, AnchorType};

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_lookback_cap() -> usize {
    DEFAULT_LOOKBACK_CAP
}

fn default_channel_capacity() -> usize {
    64
}

fn default_vwap_timeout_secs() -> u64 {
    10
}

fn default_period_timeout_secs() -> u64 {
    15
}

fn default_anchor_type() -> AnchorType {
    AnchorType::Session
}

fn default_timezone() -> String {
    "America/New_York".into()
}

fn default_band_multipliers() -> Vec<f64> {
    vec![1.0, 2.0]
}

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub vwap: VwapConfig,
    #[serde(default)]
    pub period: PeriodConfig,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_lookback_cap")]
    pub lookback_cap: usize,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lookback_cap: default_lookback_cap(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VwapConfig {
    #[serde(default = "default_vwap_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_anchor_type")]
    pub anchor_type: AnchorType,
    pub anchor_time: Option<String>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_band_multipliers")]
    pub band_multipliers: Vec<f64>,
}

impl Default for VwapConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_vwap_timeout_secs(),
            anchor_type: default_anchor_type(),
            anchor_time: None,
            timezone: default_timezone(),
            band_multipliers: default_band_multipliers(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PeriodConfig {
    #[serde(default = "default_period_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_anchor_type")]
    pub anchor_type: AnchorType,
    pub anchor_time: Option<String>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for PeriodConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_period_timeout_secs(),
            anchor_type: default_anchor_type(),
            anchor_time: None,
            timezone: default_timezone(),
        }
    }
}

impl AppConfig {
    pub fn vwap_host_options(&self) -> HostOptions {
        HostOptions {
            channel_capacity: self.engine.channel_capacity,
            timeout: Duration::from_secs(self.vwap.timeout_secs),
        }
    }

    pub fn period_host_options(&self) -> HostOptions {
        HostOptions {
            channel_capacity: self.engine.channel_capacity,
            timeout: Duration::from_secs(self.period.timeout_secs),
        }
    }
}

impl VwapConfig {
    pub fn anchor_settings(&self) -> AnchorSettings {
        AnchorSettings {
            anchor_type: self.anchor_type,
            anchor_time: self.anchor_time.clone(),
            band_multipliers: self.band_multipliers.clone(),
        }
    }
}

impl PeriodConfig {
    pub fn anchor_settings(&self) -> AnchorSettings {
        AnchorSettings {
            anchor_type: self.anchor_type,
            anchor_time: self.anchor_time.clone(),
            band_multipliers: Vec::new(),
        }
    }
}

/// Load and validate an `AppConfig` from a TOML file at `path`.
pub fn load(path: &Path) -> Result<AppConfig, Report<ConfigError>> {
    let content = std::fs::read_to_string(path)
        .change_context(ConfigError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    let config: AppConfig = toml::from_str(&content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })?;

    validate(&config)?;

    Ok(config)
}

const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

fn validate(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    validate_general(config)?;
    validate_engine(config)?;
    validate_anchor(
        "vwap",
        &config.vwap.timezone,
        config.vwap.anchor_time.as_deref(),
        config.vwap.timeout_secs,
    )?;
    validate_anchor(
        "period",
        &config.period.timezone,
        config.period.anchor_time.as_deref(),
        config.period.timeout_secs,
    )?;
    validate_multipliers(&config.vwap.band_multipliers)?;
    Ok(())
}

fn invalid(field: String) -> Report<ConfigError> {
    Report::new(ConfigError::Validation { field })
}

fn validate_general(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if !VALID_LOG_FORMATS.contains(&config.general.log_format.as_str()) {
        return Err(invalid(format!(
            "general.log_format \"{}\" is not valid",
            config.general.log_format
        )));
    }
    Ok(())
}

fn validate_engine(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if config.engine.lookback_cap == 0 {
        return Err(invalid("engine.lookback_cap must be > 0".into()));
    }
    if config.engine.channel_capacity == 0 {
        return Err(invalid("engine.channel_capacity must be > 0".into()));
    }
    Ok(())
}

fn validate_anchor(
    section: &str,
    timezone: &str,
    anchor_time: Option<&str>,
    timeout_secs: u64,
) -> Result<(), Report<ConfigError>> {
    if timeout_secs == 0 {
        return Err(invalid(format!("{section}.timeout_secs must be > 0")));
    }
    parse_timezone(timezone)
        .change_context(ConfigError::Validation {
            field: format!("{section}.timezone \"{timezone}\" is not a known timezone"),
        })?;
    if let Some(value) = anchor_time {
        parse_anchor_time(value).change_context(ConfigError::Validation {
            field: format!("{section}.anchor_time \"{value}\" must be HH:MM"),
        })?;
    }
    Ok(())
}

fn validate_multipliers(multipliers: &[f64]) -> Result<(), Report<ConfigError>> {
    for &m in multipliers {
        if !m.is_finite() || m <= 0.0 {
            return Err(invalid(format!(
                "vwap.band_multipliers: {m} must be a positive number"
            )));
        }
    }
    Ok(())
}
