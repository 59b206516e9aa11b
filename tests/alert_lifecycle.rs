/// Integration tests for the alert lifecycle over the in-memory store
///
/// Tests verify:
/// 1. Deduplication of sustained conditions across evaluation cycles
/// 2. Expiry and manual deactivation are terminal
/// 3. Admission refuses simulated and stale snapshots
/// 4. Concurrent cycles for the same city never duplicate an active alert
///
/// Run with: cargo test --test alert_lifecycle

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use envmon_service::alert::lifecycle::{AlertManager, LifecycleSettings};
use envmon_service::alert::store::{AlertStore, InMemoryAlertStore};
use envmon_service::alert::thresholds::ThresholdStore;
use envmon_service::model::{AlertType, Parameter, ReadingSnapshot, Severity};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 15, 12, 0, 0).unwrap()
}

fn manager() -> (AlertManager, Arc<InMemoryAlertStore>) {
    let store = Arc::new(InMemoryAlertStore::new());
    let thresholds = Arc::new(ThresholdStore::with_defaults().unwrap());
    let manager = AlertManager::new(store.clone(), thresholds, LifecycleSettings::default());
    (manager, store)
}

fn smoggy(city: &str, at: DateTime<Utc>, aqi: f64) -> ReadingSnapshot {
    ReadingSnapshot::new(city, at).with_air_quality(aqi)
}

// ---------------------------------------------------------------------------
// Deduplication
// ---------------------------------------------------------------------------

#[test]
fn test_sustained_condition_keeps_one_alert_and_extends_expiry() {
    let (manager, store) = manager();

    let first = manager.check_and_create_alerts_at(&smoggy("Springfield", noon(), 320.0), noon()).unwrap();
    let later = noon() + Duration::hours(1);
    let second = manager.check_and_create_alerts_at(&smoggy("Springfield", later, 330.0), later).unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_eq!(first[0].id, second[0].id);
    assert_eq!(second[0].created_at, noon());
    assert_eq!(second[0].expires_at, later + Duration::hours(12));
    assert_eq!(store.len(), 1);
}

#[test]
fn test_refresh_follows_the_latest_severity() {
    let (manager, _) = manager();

    let first = manager.check_and_create_alerts_at(&smoggy("Springfield", noon(), 150.0), noon()).unwrap();
    assert_eq!(first[0].severity, Severity::Medium);

    let later = noon() + Duration::minutes(30);
    let second = manager.check_and_create_alerts_at(&smoggy("Springfield", later, 310.0), later).unwrap();
    assert_eq!(second[0].id, first[0].id);
    assert_eq!(second[0].severity, Severity::Critical);

    let active = manager.active_alerts_at(later).unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].severity, Severity::Critical);
}

#[test]
fn test_different_cities_are_independent() {
    let (manager, _) = manager();
    manager.check_and_create_alerts_at(&smoggy("Springfield", noon(), 320.0), noon()).unwrap();
    manager.check_and_create_alerts_at(&smoggy("Shelbyville", noon(), 320.0), noon()).unwrap();

    let active = manager.active_alerts_at(noon()).unwrap();
    assert_eq!(active.len(), 2);
}

#[test]
fn test_heat_and_cold_alerts_do_not_share_a_key() {
    let (manager, _) = manager();
    let hot = ReadingSnapshot::new("Springfield", noon()).with_temperature(41.0);
    let cold = ReadingSnapshot::new("Springfield", noon()).with_temperature(-25.0);

    manager.check_and_create_alerts_at(&hot, noon()).unwrap();
    manager.check_and_create_alerts_at(&cold, noon()).unwrap();

    let mut parameters: Vec<Parameter> = manager
        .active_alerts_at(noon())
        .unwrap()
        .into_iter()
        .map(|a| a.parameter)
        .collect();
    parameters.sort();
    assert_eq!(parameters, vec![Parameter::Temperature, Parameter::TemperatureCold]);
}

// ---------------------------------------------------------------------------
// Terminal transitions
// ---------------------------------------------------------------------------

#[test]
fn test_expired_alert_is_replaced_not_revived() {
    let (manager, store) = manager();

    let first = manager.check_and_create_alerts_at(&smoggy("Springfield", noon(), 320.0), noon()).unwrap();
    let next_day = noon() + Duration::hours(13);
    let second = manager
        .check_and_create_alerts_at(&smoggy("Springfield", next_day, 320.0), next_day)
        .unwrap();

    assert_ne!(first[0].id, second[0].id);
    assert!(!store.get(first[0].id).unwrap().unwrap().is_active);
    assert_eq!(manager.active_alerts_at(next_day).unwrap().len(), 1);
}

#[test]
fn test_deactivation_is_idempotent_and_terminal() {
    let (manager, store) = manager();

    let created = manager.check_and_create_alerts_at(&smoggy("Springfield", noon(), 320.0), noon()).unwrap();
    let id = created[0].id;

    assert!(manager.deactivate(id).unwrap());
    assert!(!manager.deactivate(id).unwrap());
    assert!(!manager.deactivate(uuid::Uuid::new_v4()).unwrap());

    let later = noon() + Duration::minutes(5);
    let again = manager.check_and_create_alerts_at(&smoggy("Springfield", later, 320.0), later).unwrap();
    assert_ne!(again[0].id, id);
    assert!(!store.get(id).unwrap().unwrap().is_active);
}

#[test]
fn test_expire_stale_deactivates_only_past_alerts() {
    let (manager, _) = manager();
    let rain = ReadingSnapshot::new("Springfield", noon()).with_precipitation(35.0);

    manager.check_and_create_alerts_at(&smoggy("Springfield", noon(), 320.0), noon()).unwrap();
    let created = manager.check_and_create_alerts_at(&rain, noon()).unwrap();
    manager
        .create_alert_at(
            &manager.evaluate(&smoggy("Shelbyville", noon(), 320.0))[0],
            "Shelbyville",
            Some(Duration::hours(48)),
            noon(),
        )
        .unwrap();

    assert_eq!(created[0].alert_type, AlertType::Weather);
    assert!(created[0].message.to_lowercase().contains("flood"));

    let tomorrow = noon() + Duration::hours(24);
    assert_eq!(manager.expire_stale_at(tomorrow).unwrap(), 2);
    assert_eq!(manager.expire_stale_at(tomorrow).unwrap(), 0);

    let remaining = manager.active_alerts_at(tomorrow).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].city, "Shelbyville");
}

#[test]
fn test_active_alerts_are_ordered_by_severity_then_recency() {
    let (manager, _) = manager();
    let uv = ReadingSnapshot::new("Springfield", noon()).with_uv_index(6.0);
    let later = noon() + Duration::minutes(10);

    manager.check_and_create_alerts_at(&uv, noon()).unwrap();
    manager.check_and_create_alerts_at(&smoggy("Springfield", noon(), 320.0), noon()).unwrap();
    manager.check_and_create_alerts_at(&smoggy("Shelbyville", later, 320.0), later).unwrap();

    let active = manager.active_alerts_at(later).unwrap();
    let summary: Vec<(Severity, &str)> = active.iter().map(|a| (a.severity, a.city.as_str())).collect();
    assert_eq!(
        summary,
        vec![
            (Severity::Critical, "Shelbyville"),
            (Severity::Critical, "Springfield"),
            (Severity::Medium, "Springfield"),
        ]
    );
}

// ---------------------------------------------------------------------------
// Admission
// ---------------------------------------------------------------------------

#[test]
fn test_simulated_snapshot_raises_nothing() {
    let (manager, store) = manager();
    let snapshot = smoggy("Springfield", noon(), 320.0).simulated(true);

    assert!(manager.check_and_create_alerts_at(&snapshot, noon()).unwrap().is_empty());
    assert!(store.is_empty());
    // Evaluation itself is unaffected.
    assert_eq!(manager.evaluate(&snapshot).len(), 1);
}

#[test]
fn test_stale_snapshot_raises_nothing() {
    let (manager, store) = manager();
    let snapshot = smoggy("Springfield", noon() - Duration::hours(4), 320.0);

    assert!(manager.check_and_create_alerts_at(&snapshot, noon()).unwrap().is_empty());
    assert!(store.is_empty());
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[test]
fn test_concurrent_cycles_never_duplicate_active_alerts() {
    let (manager, store) = manager();
    let snapshot = ReadingSnapshot::new("Springfield", noon())
        .with_air_quality(320.0)
        .with_temperature(41.0)
        .with_precipitation(20.0);

    std::thread::scope(|scope| {
        for i in 0..8 {
            let manager = &manager;
            let snapshot = &snapshot;
            scope.spawn(move || {
                let now = noon() + Duration::seconds(i);
                manager.check_and_create_alerts_at(snapshot, now).unwrap();
            });
        }
    });

    let active = manager.active_alerts_at(noon() + Duration::minutes(1)).unwrap();
    assert_eq!(active.len(), 3);
    assert_eq!(store.len(), 3);
}
