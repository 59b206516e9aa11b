/// Parameter registry for the environmental alert engine.
///
/// Defines every parameter the engine can evaluate, along with its unit,
/// the alert type it raises, its plausible physical range and its default
/// severity boundaries. This is the single source of truth for parameter
/// metadata: other modules look parameters up here rather than hardcoding
/// units or ranges.

use crate::alert::thresholds::ThresholdSet;
use crate::model::{AlertType, ClassificationStrategy, ConfigError, Parameter};

// ---------------------------------------------------------------------------
// Parameter metadata
// ---------------------------------------------------------------------------

/// Metadata for a single evaluable parameter.
pub struct ParameterInfo {
    pub parameter: Parameter,
    /// Human-readable name used in messages and reports.
    pub label: &'static str,
    pub unit: &'static str,
    /// The alert type raised when this parameter crosses a boundary.
    pub alert_type: AlertType,
    /// Readings outside `[plausible_min, plausible_max]` are treated as
    /// sensor or normalization faults and skipped.
    pub plausible_min: f64,
    pub plausible_max: f64,
    /// Default low/medium/high/critical boundaries, used when the
    /// configuration does not override them.
    pub default_bounds: [f64; 4],
    pub strategy: ClassificationStrategy,
}

/// All evaluable parameters, in evaluation order.
///
/// `TemperatureCold` boundaries apply to the negated temperature: the
/// defaults below fire LOW under 0 °C and CRITICAL under -30 °C.
pub static PARAMETER_REGISTRY: &[ParameterInfo] = &[
    ParameterInfo {
        parameter: Parameter::AirQuality,
        label: "Air quality index",
        unit: "AQI",
        alert_type: AlertType::AirQuality,
        plausible_min: 0.0,
        plausible_max: 2000.0,
        default_bounds: [50.0, 100.0, 200.0, 300.0],
        strategy: ClassificationStrategy::Exceeds,
    },
    ParameterInfo {
        parameter: Parameter::Temperature,
        label: "Heat",
        unit: "°C",
        alert_type: AlertType::Weather,
        plausible_min: -100.0,
        plausible_max: 70.0,
        default_bounds: [30.0, 35.0, 40.0, 45.0],
        strategy: ClassificationStrategy::Exceeds,
    },
    ParameterInfo {
        parameter: Parameter::TemperatureCold,
        label: "Cold",
        unit: "°C",
        alert_type: AlertType::Weather,
        plausible_min: -100.0,
        plausible_max: 70.0,
        default_bounds: [0.0, 10.0, 20.0, 30.0],
        strategy: ClassificationStrategy::Exceeds,
    },
    ParameterInfo {
        parameter: Parameter::Humidity,
        label: "Humidity",
        unit: "%",
        alert_type: AlertType::Weather,
        plausible_min: 0.0,
        plausible_max: 100.0,
        default_bounds: [70.0, 80.0, 90.0, 95.0],
        strategy: ClassificationStrategy::Exceeds,
    },
    ParameterInfo {
        parameter: Parameter::Rainfall,
        label: "Rainfall",
        unit: "mm",
        alert_type: AlertType::Weather,
        plausible_min: 0.0,
        plausible_max: 2000.0,
        default_bounds: [2.0, 7.0, 15.0, 30.0],
        strategy: ClassificationStrategy::AtLeast,
    },
    ParameterInfo {
        parameter: Parameter::UvIndex,
        label: "UV index",
        unit: "UVI",
        alert_type: AlertType::Weather,
        plausible_min: 0.0,
        plausible_max: 40.0,
        default_bounds: [2.0, 5.0, 7.0, 10.0],
        strategy: ClassificationStrategy::Exceeds,
    },
];

/// Looks up a parameter by its configuration key. Returns `None` if unknown.
pub fn find_parameter(key: &str) -> Option<&'static ParameterInfo> {
    PARAMETER_REGISTRY.iter().find(|p| p.parameter.as_str() == key)
}

/// Metadata for a parameter. Every `Parameter` variant has a registry entry.
pub fn info(parameter: Parameter) -> &'static ParameterInfo {
    PARAMETER_REGISTRY
        .iter()
        .find(|p| p.parameter == parameter)
        .unwrap_or_else(|| unreachable!("parameter {} missing from registry", parameter))
}

/// The registry's default threshold sets, in registry order.
pub fn default_thresholds() -> Result<Vec<(Parameter, ThresholdSet)>, ConfigError> {
    PARAMETER_REGISTRY
        .iter()
        .map(|entry| {
            let set = ThresholdSet::from_bounds(entry.parameter, entry.default_bounds)?;
            Ok((entry.parameter, set))
        })
        .collect()
}

/// Finite and within the parameter's plausible range.
pub fn is_plausible(parameter: Parameter, value: f64) -> bool {
    let info = info(parameter);
    value.is_finite() && value >= info.plausible_min && value <= info.plausible_max
}

/// Converts a reading into the scale its boundaries are expressed in.
/// Cold boundaries count degrees below zero.
pub fn comparable_value(parameter: Parameter, value: f64) -> f64 {
    match parameter {
        Parameter::TemperatureCold => -value,
        _ => value,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
