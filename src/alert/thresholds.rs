//! Severity thresholds and the store that holds them.
//!
//! A `ThresholdSet` can only be built through [`ThresholdSet::new`], which
//! rejects non-finite or non-increasing boundaries, so a set held by the
//! store is always valid. The store replaces one parameter's set at a time
//! under a write lock; readers see either the old or the new set, never a
//! mix of both.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde::Serialize;

use crate::model::{ConfigError, Parameter, ThresholdError};
use crate::parameters;

/// Four ascending severity boundaries: `low < medium < high < critical`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdSet {
    low: f64,
    medium: f64,
    high: f64,
    critical: f64,
}

impl ThresholdSet {
    pub fn new(
        parameter: Parameter,
        low: f64,
        medium: f64,
        high: f64,
        critical: f64,
    ) -> Result<Self, ConfigError> {
        if ![low, medium, high, critical].iter().all(|b| b.is_finite()) {
            return Err(ConfigError::NonFinite(parameter));
        }
        if !(low < medium && medium < high && high < critical) {
            return Err(ConfigError::NonIncreasing {
                parameter,
                low,
                medium,
                high,
                critical,
            });
        }
        Ok(Self {
            low,
            medium,
            high,
            critical,
        })
    }

    pub fn from_bounds(parameter: Parameter, bounds: [f64; 4]) -> Result<Self, ConfigError> {
        let [low, medium, high, critical] = bounds;
        Self::new(parameter, low, medium, high, critical)
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn medium(&self) -> f64 {
        self.medium
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn critical(&self) -> f64 {
        self.critical
    }
}

/// Per-parameter threshold sets, shared between evaluation cycles.
#[derive(Debug, Default)]
pub struct ThresholdStore {
    sets: RwLock<HashMap<Parameter, ThresholdSet>>,
}

impl ThresholdStore {
    /// An empty store. Every lookup returns `NotFound` until sets are added.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding the registry defaults for every parameter.
    pub fn with_defaults() -> Result<Self, ConfigError> {
        Ok(Self::from_sets(parameters::default_thresholds()?))
    }

    pub fn from_sets(sets: impl IntoIterator<Item = (Parameter, ThresholdSet)>) -> Self {
        Self {
            sets: RwLock::new(sets.into_iter().collect()),
        }
    }

    pub fn get(&self, parameter: Parameter) -> Result<ThresholdSet, ThresholdError> {
        self.sets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&parameter)
            .copied()
            .ok_or(ThresholdError::NotFound(parameter))
    }

    /// Atomically replaces (or adds) the set for one parameter.
    pub fn replace(&self, parameter: Parameter, set: ThresholdSet) {
        self.sets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(parameter, set);
        tracing::info!(
            parameter = %parameter,
            low = set.low,
            medium = set.medium,
            high = set.high,
            critical = set.critical,
            "Threshold set replaced"
        );
    }

    /// Removes a parameter's set; it is skipped by evaluation afterwards.
    pub fn remove(&self, parameter: Parameter) -> bool {
        self.sets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&parameter)
            .is_some()
    }

    /// Configured parameters, in registry order.
    pub fn parameters(&self) -> Vec<Parameter> {
        let sets = self.sets.read().unwrap_or_else(PoisonError::into_inner);
        Parameter::ALL
            .into_iter()
            .filter(|p| sets.contains_key(p))
            .collect()
    }

    pub fn contains(&self, parameter: Parameter) -> bool {
        self.get(parameter).is_ok()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increasing_boundaries_are_accepted() {
        let set = ThresholdSet::new(Parameter::AirQuality, 50.0, 100.0, 200.0, 300.0)
            .expect("increasing boundaries should be valid");
        assert_eq!(set.critical(), 300.0);
    }

    #[test]
    fn test_equal_boundaries_are_rejected() {
        let result = ThresholdSet::new(Parameter::Humidity, 70.0, 80.0, 80.0, 95.0);
        assert!(matches!(
            result,
            Err(ConfigError::NonIncreasing { parameter: Parameter::Humidity, .. })
        ));
    }

    #[test]
    fn test_descending_boundaries_are_rejected() {
        let result = ThresholdSet::new(Parameter::UvIndex, 10.0, 7.0, 5.0, 2.0);
        assert!(result.is_err(), "descending boundaries must not load");
    }

    #[test]
    fn test_nan_boundary_is_rejected() {
        let result = ThresholdSet::new(Parameter::Rainfall, 2.0, f64::NAN, 15.0, 30.0);
        assert!(matches!(result, Err(ConfigError::NonFinite(Parameter::Rainfall))));
    }

    #[test]
    fn test_unconfigured_parameter_returns_not_found() {
        let store = ThresholdStore::new();
        assert_eq!(
            store.get(Parameter::AirQuality),
            Err(ThresholdError::NotFound(Parameter::AirQuality))
        );
    }

    #[test]
    fn test_defaults_cover_every_parameter() {
        let store = ThresholdStore::with_defaults().expect("registry defaults must be valid");
        assert_eq!(store.parameters(), Parameter::ALL.to_vec());
    }

    #[test]
    fn test_replace_swaps_the_whole_set() {
        let store = ThresholdStore::with_defaults().unwrap();
        let stricter = ThresholdSet::new(Parameter::AirQuality, 25.0, 50.0, 100.0, 150.0).unwrap();
        store.replace(Parameter::AirQuality, stricter);
        assert_eq!(store.get(Parameter::AirQuality), Ok(stricter));
    }

    #[test]
    fn test_remove_makes_parameter_unconfigured() {
        let store = ThresholdStore::with_defaults().unwrap();
        assert!(store.remove(Parameter::Humidity));
        assert!(!store.contains(Parameter::Humidity));
        assert!(!store.remove(Parameter::Humidity));
    }
}
