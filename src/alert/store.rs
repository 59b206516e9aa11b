//! Alert persistence.
//!
//! The lifecycle manager owns no state of its own; it talks to an
//! [`AlertStore`] handed to it at construction. Two stores are provided:
//! [`InMemoryAlertStore`] here and `PostgresAlertStore` in
//! [`crate::alert::postgres_store`].
//!
//! Every store must make [`AlertStore::upsert_active`] atomic per
//! `(type, parameter, city)` key: two evaluation cycles racing on the same
//! condition end up with one active alert, not two.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use crate::model::{Alert, AlertKey, CandidateAlert, StoreError};

/// Result of persisting a candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    /// No live alert existed for the key; a new one was stored.
    Created(Alert),
    /// A live alert already existed for the key. It keeps its id and
    /// creation time; expiry, severity and message were updated.
    Refreshed(Alert),
}

impl UpsertOutcome {
    pub fn alert(&self) -> &Alert {
        match self {
            UpsertOutcome::Created(a) | UpsertOutcome::Refreshed(a) => a,
        }
    }

    pub fn into_alert(self) -> Alert {
        match self {
            UpsertOutcome::Created(a) | UpsertOutcome::Refreshed(a) => a,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, UpsertOutcome::Created(_))
    }
}

pub trait AlertStore: Send + Sync {
    /// Creates an active alert for the candidate's key, or refreshes the
    /// live one already stored. An alert still flagged active but expired
    /// at `now` is deactivated and replaced, never revived.
    fn upsert_active(
        &self,
        candidate: &CandidateAlert,
        city: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<UpsertOutcome, StoreError>;

    /// Stores an alert record as-is, e.g. when migrating between stores.
    /// Fails with `Conflict` when the alert is active and its key already
    /// has an active alert.
    fn insert(&self, alert: Alert) -> Result<(), StoreError>;

    fn get(&self, id: Uuid) -> Result<Option<Alert>, StoreError>;

    /// Alerts that are active and unexpired at `now`, in no particular order.
    fn active_at(&self, now: DateTime<Utc>) -> Result<Vec<Alert>, StoreError>;

    /// Deactivates an alert. `Ok(false)` when it was already inactive or
    /// does not exist.
    fn deactivate(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Deactivates every active alert whose expiry is at or before `now`.
    /// Returns how many were deactivated.
    fn expire_before(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Process-local alert store.
///
/// `active_index` maps each key to the id of its current active alert. All
/// check-then-act sequences for a key run while holding that key's index
/// entry, which locks only the key's shard. Lock order is always index
/// before alerts, and no path takes an alerts guard while waiting on the
/// index.
///
/// Without a retention window inactive alerts are kept forever, which only
/// suits tests and short-lived processes. With one, [`AlertStore::expire_before`]
/// also drops inactive alerts whose expiry is older than `now - retention`.
#[derive(Debug, Default)]
pub struct InMemoryAlertStore {
    alerts: DashMap<Uuid, Alert>,
    active_index: DashMap<AlertKey, Uuid>,
    retention: Option<Duration>,
}

impl InMemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention);
        self
    }

    /// Removes inactive alerts that expired at or before `cutoff`. Active
    /// alerts are never removed. Returns how many were dropped.
    pub fn purge_inactive_before(&self, cutoff: DateTime<Utc>) -> usize {
        let before = self.alerts.len();
        self.alerts.retain(|_, a| a.is_active || a.expires_at > cutoff);
        before.saturating_sub(self.alerts.len())
    }

    /// Every stored alert, including inactive ones.
    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    fn insert_new(
        &self,
        candidate: &CandidateAlert,
        city: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Alert {
        let alert = Alert::from_candidate(candidate, city, now, expires_at);
        self.alerts.insert(alert.id, alert.clone());
        alert
    }
}

impl AlertStore for InMemoryAlertStore {
    fn upsert_active(
        &self,
        candidate: &CandidateAlert,
        city: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<UpsertOutcome, StoreError> {
        let key = AlertKey::new(candidate.alert_type, candidate.parameter, city);

        match self.active_index.entry(key) {
            Entry::Occupied(mut slot) => {
                let existing_id = *slot.get();
                if let Some(mut existing) = self.alerts.get_mut(&existing_id) {
                    if existing.is_live_at(now) {
                        existing.expires_at = expires_at;
                        existing.severity = candidate.severity;
                        existing.message = candidate.message.clone();
                        return Ok(UpsertOutcome::Refreshed(existing.clone()));
                    }
                    existing.is_active = false;
                }
                let alert = self.insert_new(candidate, city, now, expires_at);
                slot.insert(alert.id);
                Ok(UpsertOutcome::Created(alert))
            }
            Entry::Vacant(slot) => {
                let alert = self.insert_new(candidate, city, now, expires_at);
                slot.insert(alert.id);
                Ok(UpsertOutcome::Created(alert))
            }
        }
    }

    fn insert(&self, alert: Alert) -> Result<(), StoreError> {
        let id = alert.id;
        if !alert.is_active {
            self.alerts.insert(id, alert);
            return Ok(());
        }
        match self.active_index.entry(alert.key()) {
            Entry::Occupied(slot) => Err(StoreError::Conflict(slot.key().to_string())),
            Entry::Vacant(slot) => {
                self.alerts.insert(id, alert);
                slot.insert(id);
                Ok(())
            }
        }
    }

    fn get(&self, id: Uuid) -> Result<Option<Alert>, StoreError> {
        Ok(self.alerts.get(&id).map(|a| a.clone()))
    }

    fn active_at(&self, now: DateTime<Utc>) -> Result<Vec<Alert>, StoreError> {
        Ok(self
            .alerts
            .iter()
            .filter(|a| a.is_live_at(now))
            .map(|a| a.clone())
            .collect())
    }

    fn deactivate(&self, id: Uuid) -> Result<bool, StoreError> {
        let key = match self.alerts.get_mut(&id) {
            Some(mut alert) if alert.is_active => {
                alert.is_active = false;
                alert.value().key()
            }
            _ => return Ok(false),
        };
        self.active_index.remove_if(&key, |_, current| *current == id);
        Ok(true)
    }

    fn expire_before(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut expired = Vec::new();
        for mut alert in self.alerts.iter_mut() {
            if alert.is_active && alert.expires_at <= now {
                alert.is_active = false;
                expired.push((alert.value().key(), alert.id));
            }
        }
        for (key, id) in &expired {
            self.active_index.remove_if(key, |_, current| current == id);
        }
        if let Some(cutoff) = self.retention.and_then(|r| now.checked_sub_signed(r)) {
            let purged = self.purge_inactive_before(cutoff);
            if purged > 0 {
                tracing::debug!(purged, "Dropped inactive alerts past retention");
            }
        }
        Ok(expired.len())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AlertType, Parameter, Severity};
    use chrono::TimeZone;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap()
    }

    fn candidate(severity: Severity) -> CandidateAlert {
        CandidateAlert {
            alert_type: AlertType::AirQuality,
            parameter: Parameter::AirQuality,
            severity,
            value: 150.0,
            message: format!("air quality {}", severity),
        }
    }

    #[test]
    fn test_first_upsert_creates_active_alert() {
        let store = InMemoryAlertStore::new();
        let outcome = store
            .upsert_active(&candidate(Severity::Medium), "Springfield", noon(), noon() + Duration::hours(12))
            .unwrap();
        assert!(outcome.is_created());
        assert!(outcome.alert().is_active);
        assert_eq!(store.active_at(noon()).unwrap().len(), 1);
    }

    #[test]
    fn test_second_upsert_refreshes_instead_of_duplicating() {
        let store = InMemoryAlertStore::new();
        let first = store
            .upsert_active(&candidate(Severity::Medium), "Springfield", noon(), noon() + Duration::hours(12))
            .unwrap()
            .into_alert();
        let later = noon() + Duration::hours(1);
        let second = store
            .upsert_active(&candidate(Severity::High), "Springfield", later, later + Duration::hours(12))
            .unwrap();

        assert!(!second.is_created());
        let refreshed = second.alert();
        assert_eq!(refreshed.id, first.id);
        assert_eq!(refreshed.created_at, first.created_at);
        assert_eq!(refreshed.expires_at, later + Duration::hours(12));
        assert_eq!(refreshed.severity, Severity::High);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_different_cities_do_not_deduplicate() {
        let store = InMemoryAlertStore::new();
        let expires = noon() + Duration::hours(12);
        store.upsert_active(&candidate(Severity::Low), "Springfield", noon(), expires).unwrap();
        store.upsert_active(&candidate(Severity::Low), "Shelbyville", noon(), expires).unwrap();
        assert_eq!(store.active_at(noon()).unwrap().len(), 2);
    }

    #[test]
    fn test_expired_alert_is_replaced_not_revived() {
        let store = InMemoryAlertStore::new();
        let first = store
            .upsert_active(&candidate(Severity::Low), "Springfield", noon(), noon() + Duration::hours(1))
            .unwrap()
            .into_alert();
        let later = noon() + Duration::hours(2);
        let second = store
            .upsert_active(&candidate(Severity::Low), "Springfield", later, later + Duration::hours(1))
            .unwrap();

        assert!(second.is_created());
        assert_ne!(second.alert().id, first.id);
        let old = store.get(first.id).unwrap().unwrap();
        assert!(!old.is_active, "expired alert must end up inactive");
    }

    #[test]
    fn test_deactivate_is_idempotent() {
        let store = InMemoryAlertStore::new();
        let alert = store
            .upsert_active(&candidate(Severity::Low), "Springfield", noon(), noon() + Duration::hours(12))
            .unwrap()
            .into_alert();
        assert!(store.deactivate(alert.id).unwrap());
        assert!(!store.deactivate(alert.id).unwrap());
        assert!(!store.deactivate(Uuid::new_v4()).unwrap());
        assert!(store.active_at(noon()).unwrap().is_empty());
    }

    #[test]
    fn test_new_crossing_after_deactivation_creates_new_alert() {
        let store = InMemoryAlertStore::new();
        let expires = noon() + Duration::hours(12);
        let first = store
            .upsert_active(&candidate(Severity::Low), "Springfield", noon(), expires)
            .unwrap()
            .into_alert();
        store.deactivate(first.id).unwrap();
        let second = store
            .upsert_active(&candidate(Severity::Low), "Springfield", noon(), expires)
            .unwrap();
        assert!(second.is_created());
        assert_ne!(second.alert().id, first.id);
        assert!(!store.get(first.id).unwrap().unwrap().is_active);
    }

    #[test]
    fn test_deactivate_and_expiry_release_the_active_key() {
        let store = InMemoryAlertStore::new();
        let expires = noon() + Duration::hours(1);
        let first = store
            .upsert_active(&candidate(Severity::Low), "Springfield", noon(), expires)
            .unwrap()
            .into_alert();
        store.deactivate(first.id).unwrap();

        // The key is free again, so an active record can be inserted for it.
        let second = Alert::from_candidate(&candidate(Severity::High), "Springfield", noon(), expires);
        store.insert(second.clone()).unwrap();

        let later = noon() + Duration::hours(2);
        assert_eq!(store.expire_before(later).unwrap(), 1);
        let third = Alert::from_candidate(&candidate(Severity::Medium), "Springfield", later, later + Duration::hours(1));
        store.insert(third).unwrap();
        assert!(!store.get(second.id).unwrap().unwrap().is_active);
    }

    #[test]
    fn test_retention_drops_old_inactive_alerts_only() {
        let store = InMemoryAlertStore::new().with_retention(Duration::hours(24));
        let old = store
            .upsert_active(&candidate(Severity::Low), "Springfield", noon(), noon() + Duration::hours(1))
            .unwrap()
            .into_alert();
        let live = store
            .upsert_active(&candidate(Severity::Low), "Shelbyville", noon(), noon() + Duration::hours(48))
            .unwrap()
            .into_alert();

        // Expired but still inside the retention window.
        store.expire_before(noon() + Duration::hours(2)).unwrap();
        assert!(store.get(old.id).unwrap().is_some());

        store.expire_before(noon() + Duration::hours(30)).unwrap();
        assert!(store.get(old.id).unwrap().is_none());
        assert!(store.get(live.id).unwrap().unwrap().is_active);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_without_retention_inactive_alerts_are_kept() {
        let store = InMemoryAlertStore::new();
        store
            .upsert_active(&candidate(Severity::Low), "Springfield", noon(), noon() + Duration::hours(1))
            .unwrap();
        store.expire_before(noon() + Duration::days(365)).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_insert_rejects_a_second_active_alert_for_a_key() {
        let store = InMemoryAlertStore::new();
        let expires = noon() + Duration::hours(12);
        let first = Alert::from_candidate(&candidate(Severity::Low), "Springfield", noon(), expires);
        let second = Alert::from_candidate(&candidate(Severity::High), "Springfield", noon(), expires);
        let retired = Alert {
            is_active: false,
            ..Alert::from_candidate(&candidate(Severity::High), "Springfield", noon(), expires)
        };

        store.insert(first.clone()).unwrap();
        assert!(matches!(store.insert(second), Err(StoreError::Conflict(_))));
        store.insert(retired).unwrap();
        assert_eq!(store.len(), 2);

        // The inserted alert takes part in deduplication like any other.
        let outcome = store
            .upsert_active(&candidate(Severity::Medium), "Springfield", noon(), expires)
            .unwrap();
        assert_eq!(outcome.alert().id, first.id);
    }

    #[test]
    fn test_expire_before_counts_only_expired_active_alerts() {
        let store = InMemoryAlertStore::new();
        let short = CandidateAlert {
            parameter: Parameter::UvIndex,
            alert_type: AlertType::Weather,
            ..candidate(Severity::Low)
        };
        store.upsert_active(&short, "Springfield", noon(), noon() + Duration::hours(1)).unwrap();
        store
            .upsert_active(&candidate(Severity::Low), "Springfield", noon(), noon() + Duration::hours(12))
            .unwrap();

        let later = noon() + Duration::hours(3);
        assert_eq!(store.expire_before(later).unwrap(), 1);
        assert_eq!(store.expire_before(later).unwrap(), 0);
        assert_eq!(store.active_at(later).unwrap().len(), 1);
    }
}
