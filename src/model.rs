/// ReadingSnapshot, Parameter, Severity, Alert and the error types shared by
/// every other module.
///
/// Core data types for the environmental alert and recommendation engine.
///
/// This module defines the shared domain model imported by all other modules.
/// Apart from small accessors (sanitized reading lookup, alert liveness) it
/// holds no logic and performs no I/O.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// An evaluable environmental parameter.
///
/// Heat and cold are separate parameters: `Temperature` compares the raw
/// reading against its boundaries, `TemperatureCold` compares the negated
/// reading, so each has its own increasing `ThresholdSet`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Parameter {
    AirQuality,
    Temperature,
    TemperatureCold,
    Humidity,
    Rainfall,
    UvIndex,
}

impl Parameter {
    pub const ALL: [Parameter; 6] = [
        Parameter::AirQuality,
        Parameter::Temperature,
        Parameter::TemperatureCold,
        Parameter::Humidity,
        Parameter::Rainfall,
        Parameter::UvIndex,
    ];

    /// Configuration / storage key, e.g. `"AIR_QUALITY"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Parameter::AirQuality => "AIR_QUALITY",
            Parameter::Temperature => "TEMPERATURE",
            Parameter::TemperatureCold => "TEMPERATURE_COLD",
            Parameter::Humidity => "HUMIDITY",
            Parameter::Rainfall => "RAINFALL",
            Parameter::UvIndex => "UV_INDEX",
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Parameter {
    type Err = UnknownKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Parameter::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownKey::Parameter(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Severity and alert type
// ---------------------------------------------------------------------------

/// Severity tiers, in ascending order of severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = UnknownKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            "CRITICAL" => Ok(Severity::Critical),
            other => Err(UnknownKey::Severity(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    AirQuality,
    Weather,
    Other,
}

impl AlertType {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertType::AirQuality => "AIR_QUALITY",
            AlertType::Weather => "WEATHER",
            AlertType::Other => "OTHER",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertType {
    type Err = UnknownKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AIR_QUALITY" => Ok(AlertType::AirQuality),
            "WEATHER" => Ok(AlertType::Weather),
            "OTHER" => Ok(AlertType::Other),
            other => Err(UnknownKey::AlertType(other.to_string())),
        }
    }
}

/// How a parameter's value is mapped onto its four boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationStrategy {
    /// Generic four-tier scheme: a tier applies when the value is strictly
    /// greater than its boundary.
    Exceeds,
    /// Inclusive intensity bands: a tier applies when the value is at or
    /// above its boundary. Used for rainfall, where most readings are zero.
    AtLeast,
}

// ---------------------------------------------------------------------------
// Reading snapshot
// ---------------------------------------------------------------------------

/// One normalized evaluation input for a city.
///
/// Every numeric field is either present or absent. Use [`ReadingSnapshot::value`]
/// rather than the raw fields: it drops NaN, infinite and physically
/// implausible values so evaluators never see them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingSnapshot {
    pub city: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub air_quality_index: Option<f64>,
    #[serde(default)]
    pub temperature_c: Option<f64>,
    #[serde(default)]
    pub humidity_pct: Option<f64>,
    #[serde(default)]
    pub precipitation_mm: Option<f64>,
    #[serde(default)]
    pub uv_index: Option<f64>,
    /// Set by the provider adapter when the values were fabricated
    /// (provider outage fallback) rather than observed.
    #[serde(default)]
    pub simulated: bool,
}

impl ReadingSnapshot {
    /// A snapshot with every reading absent.
    pub fn new(city: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            city: city.into(),
            timestamp,
            air_quality_index: None,
            temperature_c: None,
            humidity_pct: None,
            precipitation_mm: None,
            uv_index: None,
            simulated: false,
        }
    }

    pub fn with_air_quality(mut self, aqi: f64) -> Self {
        self.air_quality_index = Some(aqi);
        self
    }

    pub fn with_temperature(mut self, celsius: f64) -> Self {
        self.temperature_c = Some(celsius);
        self
    }

    pub fn with_humidity(mut self, pct: f64) -> Self {
        self.humidity_pct = Some(pct);
        self
    }

    pub fn with_precipitation(mut self, mm: f64) -> Self {
        self.precipitation_mm = Some(mm);
        self
    }

    pub fn with_uv_index(mut self, uv: f64) -> Self {
        self.uv_index = Some(uv);
        self
    }

    pub fn simulated(mut self, simulated: bool) -> Self {
        self.simulated = simulated;
        self
    }

    /// The raw field backing a parameter. Both temperature parameters read
    /// `temperature_c`.
    pub fn raw_value(&self, parameter: Parameter) -> Option<f64> {
        match parameter {
            Parameter::AirQuality => self.air_quality_index,
            Parameter::Temperature | Parameter::TemperatureCold => self.temperature_c,
            Parameter::Humidity => self.humidity_pct,
            Parameter::Rainfall => self.precipitation_mm,
            Parameter::UvIndex => self.uv_index,
        }
    }

    /// The reading for `parameter`, or `None` if it is absent, NaN,
    /// infinite, or outside the parameter's plausible range.
    pub fn value(&self, parameter: Parameter) -> Option<f64> {
        self.raw_value(parameter)
            .filter(|v| crate::parameters::is_plausible(parameter, *v))
    }

    /// True when no parameter has a usable reading.
    pub fn is_empty(&self) -> bool {
        Parameter::ALL.iter().all(|p| self.value(*p).is_none())
    }
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// An alert proposed by the evaluator, before deduplication and persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateAlert {
    pub alert_type: AlertType,
    pub parameter: Parameter,
    pub severity: Severity,
    /// The reading that triggered the candidate, in the parameter's unit.
    pub value: f64,
    pub message: String,
}

/// Deduplication key: at most one active alert exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlertKey {
    pub alert_type: AlertType,
    pub parameter: Parameter,
    pub city: String,
}

impl AlertKey {
    pub fn new(alert_type: AlertType, parameter: Parameter, city: &str) -> Self {
        Self {
            alert_type,
            parameter,
            city: city.to_string(),
        }
    }
}

impl fmt::Display for AlertKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.alert_type, self.parameter, self.city)
    }
}

/// A persisted alert.
///
/// Lifecycle: created active, then deactivated either manually or once
/// `expires_at` has passed. Inactive is terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub parameter: Parameter,
    pub severity: Severity,
    pub city: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
}

impl Alert {
    /// Builds a fresh active alert from a candidate with a new id.
    pub fn from_candidate(
        candidate: &CandidateAlert,
        city: &str,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            alert_type: candidate.alert_type,
            parameter: candidate.parameter,
            severity: candidate.severity,
            city: city.to_string(),
            message: candidate.message.clone(),
            created_at,
            expires_at,
            is_active: true,
        }
    }

    pub fn key(&self) -> AlertKey {
        AlertKey::new(self.alert_type, self.parameter, &self.city)
    }

    /// Active and not yet expired at `now`.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at > now
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// A key that names no `Parameter`, `Severity` or `AlertType`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnknownKey {
    #[error("unknown parameter '{0}'")]
    Parameter(String),
    #[error("unknown severity '{0}'")]
    Severity(String),
    #[error("unknown alert type '{0}'")]
    AlertType(String),
}

/// Configuration and catalog validation errors. Always fatal at load time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    UnknownKey(#[from] UnknownKey),
    #[error("threshold boundaries for {0} must be finite numbers")]
    NonFinite(Parameter),
    #[error(
        "thresholds for {parameter} must be strictly increasing \
         (low < medium < high < critical), got {low}/{medium}/{high}/{critical}"
    )]
    NonIncreasing {
        parameter: Parameter,
        low: f64,
        medium: f64,
        high: f64,
        critical: f64,
    },
    #[error("failed to parse content catalog: {0}")]
    CatalogParse(#[from] serde_json::Error),
    #[error("invalid content item {id}: {reason}")]
    InvalidContent { id: u64, reason: String },
    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Threshold lookup failure. Evaluators treat it as "skip this parameter".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThresholdError {
    #[error("no thresholds configured for {0}")]
    NotFound(Parameter),
}

/// Failures of the alert persistence collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("alert store unavailable: {0}")]
    Unavailable(String),
    #[error("alert store operation timed out after {0} ms")]
    Timeout(u64),
    #[error("database error: {0}")]
    Database(#[from] postgres::Error),
    #[error("corrupt alert record: {0}")]
    Corrupt(#[from] UnknownKey),
    #[error("an active alert already exists for {0}")]
    Conflict(String),
    #[error("alert time-to-live {0} is not positive or overflows the expiry")]
    InvalidTtl(chrono::Duration),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
