/// Property tests for severity classification and recommendation bounds
///
/// Run with: cargo test --test severity_properties

use chrono::{Duration, TimeZone, Utc};
use envmon_service::alert::evaluator::classify;
use envmon_service::alert::thresholds::{ThresholdSet, ThresholdStore};
use envmon_service::model::{ClassificationStrategy, Parameter, ReadingSnapshot, Severity};
use envmon_service::recommend::catalog::{Catalog, ConditionType, ContentItem};
use envmon_service::recommend::matcher::recommend;
use proptest::prelude::*;

fn strategy() -> impl Strategy<Value = ClassificationStrategy> {
    prop_oneof![
        Just(ClassificationStrategy::Exceeds),
        Just(ClassificationStrategy::AtLeast),
    ]
}

/// Strictly increasing boundaries built from positive gaps.
fn threshold_set() -> impl Strategy<Value = ThresholdSet> {
    (0.0f64..100.0, 0.1f64..50.0, 0.1f64..50.0, 0.1f64..50.0).prop_map(|(low, a, b, c)| {
        ThresholdSet::new(Parameter::AirQuality, low, low + a, low + a + b, low + a + b + c)
            .expect("generated boundaries are increasing")
    })
}

fn content_item() -> impl Strategy<Value = (ConditionType, f64, f64, i32, i64, bool)> {
    (
        prop_oneof![
            Just(ConditionType::Temperature),
            Just(ConditionType::AirQuality),
            Just(ConditionType::General),
        ],
        -20.0f64..50.0,
        0.0f64..100.0,
        -5i32..5,
        0i64..365,
        any::<bool>(),
    )
}

fn build_catalog(entries: Vec<(ConditionType, f64, f64, i32, i64, bool)>) -> Catalog {
    let epoch = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let items = entries
        .into_iter()
        .enumerate()
        .map(|(i, (ct, min, width, priority, days, featured))| {
            let published = epoch + Duration::days(days);
            let item = if ct == ConditionType::General {
                ContentItem::general(i as u64, "g", priority, published)
            } else {
                ContentItem::ranged(i as u64, "r", ct, min, min + width, priority, published)
                    .expect("generated range is ordered")
            };
            item.with_featured(featured)
        })
        .collect();
    Catalog::new(items).expect("generated ids are unique")
}

proptest! {
    #[test]
    fn severity_is_monotonic_in_value(
        set in threshold_set(),
        strategy in strategy(),
        a in -10.0f64..400.0,
        b in -10.0f64..400.0,
    ) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(classify(lo, &set, strategy) <= classify(hi, &set, strategy));
    }

    #[test]
    fn above_critical_is_always_critical(
        set in threshold_set(),
        strategy in strategy(),
        excess in 0.001f64..1000.0,
    ) {
        let value = set.critical() + excess;
        prop_assert_eq!(classify(value, &set, strategy), Some(Severity::Critical));
    }

    #[test]
    fn at_or_below_low_never_alerts_when_strict(set in threshold_set(), deficit in 0.0f64..100.0) {
        let value = set.low() - deficit;
        prop_assert_eq!(classify(value, &set, ClassificationStrategy::Exceeds), None);
    }

    #[test]
    fn recommendations_are_unique_and_bounded(
        entries in proptest::collection::vec(content_item(), 0..30),
        temperature in -30.0f64..50.0,
        aqi in 0.0f64..120.0,
        limit in 0usize..12,
    ) {
        let catalog = build_catalog(entries);
        let snapshot = ReadingSnapshot::new("Springfield", Utc::now())
            .with_temperature(temperature)
            .with_air_quality(aqi);

        let result = recommend(&snapshot, &catalog, limit);
        let mut ids = result.ids();
        prop_assert!(ids.len() <= limit);
        ids.sort_unstable();
        ids.dedup();
        prop_assert_eq!(ids.len(), result.len());

        // General padding only appears when matches did not fill the limit.
        if result.matched_count == limit {
            prop_assert!(result.fallback().is_empty());
        }
        prop_assert!(result.fallback().iter().all(|i| i.is_general()));
    }

    #[test]
    fn evaluator_only_alerts_on_configured_parameters(aqi in 0.0f64..500.0, uv in 0.0f64..15.0) {
        let thresholds = ThresholdStore::with_defaults().expect("defaults are valid");
        thresholds.remove(Parameter::UvIndex);
        let snapshot = ReadingSnapshot::new("Springfield", Utc::now())
            .with_air_quality(aqi)
            .with_uv_index(uv);

        let candidates = envmon_service::alert::evaluator::evaluate(&snapshot, &thresholds);
        prop_assert!(candidates.iter().all(|c| c.parameter == Parameter::AirQuality));
    }
}
