//! Engine configuration, loaded from a TOML file.
//!
//! Every section is optional. Threshold tables override the registry
//! defaults per parameter; unknown parameter keys and badly ordered
//! boundaries are rejected here, at load time, so evaluation never sees an
//! invalid threshold set.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration as StdDuration;

use chrono::Duration;
use serde::Deserialize;

use crate::alert::lifecycle::{DEFAULT_TTL_HOURS, LifecycleSettings, MAX_TTL_HOURS};
use crate::alert::staleness::AdmissionPolicy;
use crate::alert::thresholds::{ThresholdSet, ThresholdStore};
use crate::model::{ConfigError, Parameter};

/// Top-level configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub recommendations: RecommendationsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Keyed by parameter name, e.g. `[thresholds.AIR_QUALITY]`.
    #[serde(default)]
    pub thresholds: BTreeMap<String, ThresholdBounds>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AlertsConfig {
    #[serde(default = "default_ttl_hours")]
    pub default_ttl_hours: i64,
    /// Upper bound on any single alert store call.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub refuse_simulated: bool,
    /// 0 disables the staleness check.
    #[serde(default = "default_max_snapshot_age")]
    pub max_snapshot_age_minutes: u64,
    /// Parameters left unconfigured (never evaluated).
    #[serde(default)]
    pub disabled_parameters: Vec<String>,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            default_ttl_hours: default_ttl_hours(),
            store_timeout_ms: default_store_timeout_ms(),
            refuse_simulated: true,
            max_snapshot_age_minutes: default_max_snapshot_age(),
            disabled_parameters: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RecommendationsConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

impl Default for RecommendationsConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    pub file: Option<String>,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
            json: false,
        }
    }
}

/// Raw boundaries as written in the file; validated into a `ThresholdSet`.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct ThresholdBounds {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

fn default_ttl_hours() -> i64 { DEFAULT_TTL_HOURS }
fn default_store_timeout_ms() -> u64 { 2000 }
fn default_true() -> bool { true }
fn default_max_snapshot_age() -> u64 { 180 }
fn default_limit() -> usize { 5 }
fn default_log_level() -> String { "info".into() }

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Reads and validates a configuration file.
pub fn load_config(path: impl AsRef<Path>) -> Result<EngineConfig, ConfigError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let config = parse_config(&text)?;
    tracing::info!(path = %path.display(), "Loaded engine configuration");
    Ok(config)
}

/// Parses and validates configuration text.
pub fn parse_config(text: &str) -> Result<EngineConfig, ConfigError> {
    let config: EngineConfig = toml::from_str(text)?;
    config.validate()?;
    Ok(config)
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.default_ttl()?;
        if self.alerts.store_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "alerts.store_timeout_ms must be positive".to_string(),
            ));
        }
        self.threshold_sets().map(|_| ())
    }

    /// Registry defaults overlaid with the configured tables, minus any
    /// disabled parameters.
    pub fn threshold_sets(&self) -> Result<Vec<(Parameter, ThresholdSet)>, ConfigError> {
        let mut overrides = BTreeMap::new();
        for (key, bounds) in &self.thresholds {
            let parameter: Parameter = key.parse()?;
            overrides.insert(parameter, *bounds);
        }
        let disabled = self
            .alerts
            .disabled_parameters
            .iter()
            .map(|k| k.parse::<Parameter>())
            .collect::<Result<Vec<_>, _>>()?;

        let mut sets = Vec::new();
        for entry in crate::parameters::PARAMETER_REGISTRY {
            if disabled.contains(&entry.parameter) {
                continue;
            }
            let set = match overrides.get(&entry.parameter) {
                Some(b) => ThresholdSet::new(entry.parameter, b.low, b.medium, b.high, b.critical)?,
                None => ThresholdSet::from_bounds(entry.parameter, entry.default_bounds)?,
            };
            sets.push((entry.parameter, set));
        }
        Ok(sets)
    }

    pub fn threshold_store(&self) -> Result<ThresholdStore, ConfigError> {
        Ok(ThresholdStore::from_sets(self.threshold_sets()?))
    }

    /// `alerts.default_ttl_hours` as a duration, between one hour and
    /// `MAX_TTL_HOURS`.
    pub fn default_ttl(&self) -> Result<Duration, ConfigError> {
        let hours = self.alerts.default_ttl_hours;
        if !(1..=MAX_TTL_HOURS).contains(&hours) {
            return Err(ConfigError::Invalid(format!(
                "alerts.default_ttl_hours must be between 1 and {}, got {}",
                MAX_TTL_HOURS, hours
            )));
        }
        Duration::try_hours(hours).ok_or_else(|| {
            ConfigError::Invalid(format!("alerts.default_ttl_hours out of range: {}", hours))
        })
    }

    pub fn lifecycle_settings(&self) -> Result<LifecycleSettings, ConfigError> {
        let max_age = self.alerts.max_snapshot_age_minutes;
        Ok(LifecycleSettings {
            default_ttl: self.default_ttl()?,
            admission: AdmissionPolicy {
                refuse_simulated: self.alerts.refuse_simulated,
                max_age_minutes: (max_age > 0).then_some(max_age),
            },
        })
    }

    pub fn store_timeout(&self) -> StdDuration {
        StdDuration::from_millis(self.alerts.store_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
