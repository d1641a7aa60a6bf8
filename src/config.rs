//! Configuration file handling
//!
//! The config lives in a JSON file (default `config.json`, overridable with
//! `AUTO_ACCEPT_CONFIG` or `--config=`). A missing file is created with defaults.

use crate::queue::{ClickPolicy, ControllerSettings, DetectionRegion, MatchCriteria};
use crate::server::auth::Subnet;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_ENV_VAR: &str = "AUTO_ACCEPT_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid config value for {field}: {reason}")]
    Validation { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bind_host: String,
    pub bind_port: u16,
    pub auth_token: String,
    pub auto_accept_enabled: bool,
    pub accept_delay_min_s: f64,
    pub accept_delay_max_s: f64,
    pub accept_click_jitter_px: i32,
    pub accept_click_cooldown_s: f64,
    pub stop_after_match_found_s: f64,
    pub accept_region: DetectionRegion,
    pub queue_region: DetectionRegion,
    pub accept_pixel_probe: MatchCriteria,
    pub poll_interval_s: f64,
    pub allowed_subnets: Vec<String>,
    pub log_file: Option<String>,
    pub log_level: String,
    /// Image file the pixel probe reads; kept fresh by an external capture tool
    pub capture_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            bind_port: 8765,
            auth_token: "change-me".to_string(),
            auto_accept_enabled: true,
            accept_delay_min_s: 0.2,
            accept_delay_max_s: 0.5,
            accept_click_jitter_px: 4,
            accept_click_cooldown_s: 1.0,
            stop_after_match_found_s: 15.0,
            accept_region: DetectionRegion::default(),
            queue_region: DetectionRegion::default(),
            accept_pixel_probe: MatchCriteria::default(),
            poll_interval_s: 0.75,
            allowed_subnets: vec![
                "127.0.0.1/32".to_string(),
                "192.168.0.0/16".to_string(),
                "10.0.0.0/8".to_string(),
            ],
            log_file: None,
            log_level: "info".to_string(),
            capture_path: "screen.png".to_string(),
        }
    }
}

/// Config path: explicit argument, then `AUTO_ACCEPT_CONFIG`, then `config.json`
pub fn resolve_config_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field,
        reason: reason.into(),
    }
}

/// Upper bound for every duration-like setting (one day)
pub const MAX_SECONDS: f64 = 86_400.0;
pub const MAX_JITTER_PX: i32 = 1_000;

fn bounded_seconds(field: &'static str, value: f64) -> ConfigResult<()> {
    if !value.is_finite() || !(0.0..=MAX_SECONDS).contains(&value) {
        return Err(invalid(
            field,
            format!("must be between 0 and {} seconds, got {}", MAX_SECONDS, value),
        ));
    }
    Ok(())
}

fn seconds(value: f64) -> Duration {
    // Validated values always convert
    Duration::try_from_secs_f64(value).unwrap_or_default()
}

fn check_region(field: &'static str, region: &DetectionRegion) -> ConfigResult<()> {
    if !region.fits_screen_space() {
        return Err(invalid(field, "x + width and y + height must fit in i32"));
    }
    Ok(())
}

impl AppConfig {
    /// Load and validate; writes a default file when none exists yet
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            let config = AppConfig::default();
            config.save(path)?;
            log::info!("Created default config at {:?}", path);
            return Ok(config);
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AppConfig =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.bind_port == 0 {
            return Err(invalid("bind_port", "must be a valid TCP port"));
        }
        if self.auth_token.is_empty() {
            return Err(invalid("auth_token", "must not be empty"));
        }
        bounded_seconds("accept_delay_min_s", self.accept_delay_min_s)?;
        bounded_seconds("accept_delay_max_s", self.accept_delay_max_s)?;
        bounded_seconds("accept_click_cooldown_s", self.accept_click_cooldown_s)?;
        if self.accept_delay_min_s > self.accept_delay_max_s {
            return Err(invalid(
                "accept_delay_min_s",
                "must be <= accept_delay_max_s",
            ));
        }
        if !(0..=MAX_JITTER_PX).contains(&self.accept_click_jitter_px) {
            return Err(invalid(
                "accept_click_jitter_px",
                format!("must be between 0 and {}", MAX_JITTER_PX),
            ));
        }
        // Zero or negative disables the disarm timeout
        if !self.stop_after_match_found_s.is_finite() || self.stop_after_match_found_s > MAX_SECONDS
        {
            return Err(invalid(
                "stop_after_match_found_s",
                format!("must be a number no greater than {}", MAX_SECONDS),
            ));
        }
        if !self.poll_interval_s.is_finite()
            || self.poll_interval_s <= 0.0
            || self.poll_interval_s > MAX_SECONDS
        {
            return Err(invalid(
                "poll_interval_s",
                format!("must be greater than 0 and at most {}", MAX_SECONDS),
            ));
        }
        check_region("accept_region", &self.accept_region)?;
        check_region("queue_region", &self.queue_region)?;
        let probe = &self.accept_pixel_probe;
        if !(probe.min_fraction > 0.0 && probe.min_fraction <= 1.0) {
            return Err(invalid(
                "accept_pixel_probe.min_fraction",
                "must be in (0, 1]",
            ));
        }
        for subnet in &self.allowed_subnets {
            Subnet::parse(subnet).map_err(|reason| invalid("allowed_subnets", reason))?;
        }
        if self.capture_path.is_empty() {
            return Err(invalid("capture_path", "must not be empty"));
        }
        Ok(())
    }

    pub fn click_policy(&self) -> ClickPolicy {
        ClickPolicy {
            delay_min: seconds(self.accept_delay_min_s),
            delay_max: seconds(self.accept_delay_max_s),
            jitter_px: self.accept_click_jitter_px,
            cooldown: seconds(self.accept_click_cooldown_s),
        }
    }

    /// Controller settings derived from a validated config
    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            accept_region: self.accept_region,
            queue_region: self.queue_region,
            match_criteria: self.accept_pixel_probe,
            poll_interval: seconds(self.poll_interval_s),
            click_policy: self.click_policy(),
            stop_after_match_found_s: self.stop_after_match_found_s,
            auto_accept_enabled: self.auto_accept_enabled,
        }
    }

    /// Parsed allow-list; entries were checked by `validate`
    pub fn subnets(&self) -> Vec<Subnet> {
        self.allowed_subnets
            .iter()
            .filter_map(|s| Subnet::parse(s).ok())
            .collect()
    }
}

/// Partial update accepted by `POST /config`; absent fields keep their value
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConfigUpdate {
    pub auto_accept_enabled: Option<bool>,
    pub accept_delay_min_s: Option<f64>,
    pub accept_delay_max_s: Option<f64>,
    pub accept_click_jitter_px: Option<i32>,
    pub accept_click_cooldown_s: Option<f64>,
    pub stop_after_match_found_s: Option<f64>,
    pub accept_region: Option<DetectionRegion>,
    pub queue_region: Option<DetectionRegion>,
    pub accept_pixel_probe: Option<MatchCriteria>,
    pub poll_interval_s: Option<f64>,
}

impl ConfigUpdate {
    /// Merge onto `base` and validate the result
    pub fn apply(&self, base: &AppConfig) -> ConfigResult<AppConfig> {
        let mut next = base.clone();
        if let Some(v) = self.auto_accept_enabled {
            next.auto_accept_enabled = v;
        }
        if let Some(v) = self.accept_delay_min_s {
            next.accept_delay_min_s = v;
        }
        if let Some(v) = self.accept_delay_max_s {
            next.accept_delay_max_s = v;
        }
        if let Some(v) = self.accept_click_jitter_px {
            next.accept_click_jitter_px = v;
        }
        if let Some(v) = self.accept_click_cooldown_s {
            next.accept_click_cooldown_s = v;
        }
        if let Some(v) = self.stop_after_match_found_s {
            next.stop_after_match_found_s = v;
        }
        if let Some(v) = self.accept_region {
            next.accept_region = v;
        }
        if let Some(v) = self.queue_region {
            next.queue_region = v;
        }
        if let Some(v) = self.accept_pixel_probe {
            next.accept_pixel_probe = v;
        }
        if let Some(v) = self.poll_interval_s {
            next.poll_interval_s = v;
        }
        next.validate()?;
        Ok(next)
    }
}
