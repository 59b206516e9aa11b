//! Threshold evaluation: turns a reading snapshot into candidate alerts.
//!
//! Evaluation is a pure function of the snapshot and the threshold store.
//! It never fails: absent or unusable readings and unconfigured parameters
//! are skipped, one parameter at a time.

use crate::alert::thresholds::{ThresholdSet, ThresholdStore};
use crate::model::{CandidateAlert, ClassificationStrategy, Parameter, ReadingSnapshot, Severity};
use crate::parameters::{self, PARAMETER_REGISTRY};

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Classifies `value` by the highest boundary it crosses. Returns `None`
/// when the value is below the low boundary.
///
/// `value` must already be on the boundaries' scale (see
/// [`parameters::comparable_value`]).
pub fn classify(
    value: f64,
    set: &ThresholdSet,
    strategy: ClassificationStrategy,
) -> Option<Severity> {
    let crosses = |boundary: f64| match strategy {
        ClassificationStrategy::Exceeds => value > boundary,
        ClassificationStrategy::AtLeast => value >= boundary,
    };

    if crosses(set.critical()) {
        Some(Severity::Critical)
    } else if crosses(set.high()) {
        Some(Severity::High)
    } else if crosses(set.medium()) {
        Some(Severity::Medium)
    } else if crosses(set.low()) {
        Some(Severity::Low)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Alert text for a parameter at a severity.
pub fn alert_message(parameter: Parameter, severity: Severity) -> &'static str {
    use Parameter::*;
    use Severity::*;

    match (parameter, severity) {
        (AirQuality, Low) => "Air quality is moderate. Unusually sensitive people should limit prolonged outdoor exertion.",
        (AirQuality, Medium) => "Air quality is unhealthy for sensitive groups. Children, older adults and people with respiratory conditions should reduce outdoor activity.",
        (AirQuality, High) => "Air quality is unhealthy. Everyone should limit outdoor exertion; sensitive groups should stay indoors.",
        (AirQuality, Critical) => "Hazardous air quality. Avoid all outdoor activity and keep windows closed.",

        (Temperature, Low) => "Warm conditions. Stay hydrated and take breaks in the shade.",
        (Temperature, Medium) => "Heat advisory. Limit strenuous outdoor activity during the hottest hours.",
        (Temperature, High) => "Heat warning. Risk of heat exhaustion; stay in cool places and check on vulnerable neighbours.",
        (Temperature, Critical) => "Extreme heat emergency. Risk of heat stroke; avoid going outside.",

        (TemperatureCold, Low) => "Freezing temperatures. Watch for icy surfaces.",
        (TemperatureCold, Medium) => "Cold advisory. Dress in layers and limit time outdoors.",
        (TemperatureCold, High) => "Severe cold warning. Risk of frostbite on exposed skin.",
        (TemperatureCold, Critical) => "Extreme cold emergency. Risk of hypothermia; stay indoors.",

        (Humidity, Low) => "Humid conditions. Outdoor exertion may feel harder than usual.",
        (Humidity, Medium) => "High humidity. Increased risk of heat stress and mould growth indoors.",
        (Humidity, High) => "Very high humidity. Limit strenuous activity and ventilate living spaces.",
        (Humidity, Critical) => "Extreme humidity. Heat stress risk is severe even at moderate temperatures.",

        (Rainfall, Low) => "Light rain. Roads may be slippery.",
        (Rainfall, Medium) => "Moderate rain. Expect puddles and reduced visibility.",
        (Rainfall, High) => "Heavy rain. Local waterlogging is likely; avoid low-lying roads.",
        (Rainfall, Critical) => "Torrential rain with flood risk. Move to higher ground if water is rising and avoid flooded roads.",

        (UvIndex, Low) => "Moderate UV. Wear sunglasses and use sunscreen.",
        (UvIndex, Medium) => "High UV. Seek shade during midday hours and cover up.",
        (UvIndex, High) => "Very high UV. Unprotected skin can burn quickly; minimize sun exposure.",
        (UvIndex, Critical) => "Extreme UV. Avoid being outside during midday hours.",
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Classifies one parameter of a snapshot. `None` when the reading is
/// unusable, the parameter is unconfigured, or no boundary is crossed.
pub fn evaluate_parameter(
    snapshot: &ReadingSnapshot,
    parameter: Parameter,
    thresholds: &ThresholdStore,
) -> Option<CandidateAlert> {
    let value = snapshot.value(parameter)?;

    let set = match thresholds.get(parameter) {
        Ok(set) => set,
        Err(e) => {
            tracing::trace!(city = %snapshot.city, error = %e, "Skipping parameter");
            return None;
        }
    };

    let info = parameters::info(parameter);
    let severity = classify(
        parameters::comparable_value(parameter, value),
        &set,
        info.strategy,
    )?;

    Some(CandidateAlert {
        alert_type: info.alert_type,
        parameter,
        severity,
        value,
        message: alert_message(parameter, severity).to_string(),
    })
}

/// Produces zero or more candidate alerts for a snapshot, in registry order.
pub fn evaluate(snapshot: &ReadingSnapshot, thresholds: &ThresholdStore) -> Vec<CandidateAlert> {
    let candidates: Vec<CandidateAlert> = PARAMETER_REGISTRY
        .iter()
        .filter_map(|entry| evaluate_parameter(snapshot, entry.parameter, thresholds))
        .collect();

    for parameter in Parameter::ALL {
        if snapshot.raw_value(parameter).is_some() && snapshot.value(parameter).is_none() {
            tracing::debug!(
                city = %snapshot.city,
                parameter = %parameter,
                raw = ?snapshot.raw_value(parameter),
                "Ignoring unusable reading"
            );
        }
    }

    tracing::debug!(
        city = %snapshot.city,
        candidates = candidates.len(),
        "Snapshot evaluated"
    );
    candidates
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
