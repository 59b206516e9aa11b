//! Alert lifecycle: creation with deduplication, expiry, deactivation.
//!
//! `AlertManager` is the only component that writes alerts. Evaluation and
//! persistence are kept separable: when the store fails part-way through a
//! cycle, [`PersistError`] hands back the candidates that were not stored so
//! the caller can retry persistence without re-evaluating.

use std::cmp::Reverse;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::alert::evaluator;
use crate::alert::staleness::{self, Admission, AdmissionPolicy};
use crate::alert::store::{AlertStore, UpsertOutcome};
use crate::alert::thresholds::ThresholdStore;
use crate::logging;
use crate::model::{Alert, CandidateAlert, ReadingSnapshot, StoreError};

/// Default alert time-to-live for weather and air-quality alerts.
pub const DEFAULT_TTL_HOURS: i64 = 12;

/// Longest configurable default time-to-live: one leap year.
pub const MAX_TTL_HOURS: i64 = 366 * 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleSettings {
    pub default_ttl: Duration,
    pub admission: AdmissionPolicy,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            default_ttl: Duration::hours(DEFAULT_TTL_HOURS),
            admission: AdmissionPolicy::default(),
        }
    }
}

/// A persistence failure during `check_and_create_alerts`.
#[derive(Debug, Error)]
#[error("failed to persist {pending_count} alert(s) for {city}: {source}", pending_count = .pending.len())]
pub struct PersistError {
    pub city: String,
    /// Alerts stored before the failure.
    pub persisted: Vec<Alert>,
    /// Candidates not stored, including the one that failed. Still valid
    /// evaluation results; pass them to `persist_candidates_at` to retry.
    pub pending: Vec<CandidateAlert>,
    #[source]
    pub source: StoreError,
}

pub struct AlertManager {
    store: Arc<dyn AlertStore>,
    thresholds: Arc<ThresholdStore>,
    settings: LifecycleSettings,
}

impl AlertManager {
    pub fn new(
        store: Arc<dyn AlertStore>,
        thresholds: Arc<ThresholdStore>,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            store,
            thresholds,
            settings,
        }
    }

    pub fn settings(&self) -> &LifecycleSettings {
        &self.settings
    }

    pub fn thresholds(&self) -> &ThresholdStore {
        &self.thresholds
    }

    /// Evaluates a snapshot without persisting anything.
    pub fn evaluate(&self, snapshot: &ReadingSnapshot) -> Vec<CandidateAlert> {
        evaluator::evaluate(snapshot, &self.thresholds)
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Persists one candidate with `expires_at = now + ttl` (default TTL when
    /// `ttl` is `None`). A live alert for the same `(type, parameter, city)`
    /// is refreshed rather than duplicated. A non-positive `ttl`, or one that
    /// pushes the expiry past the representable range, fails with
    /// `InvalidTtl`.
    pub fn create_alert_at(
        &self,
        candidate: &CandidateAlert,
        city: &str,
        ttl: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Result<Alert, StoreError> {
        self.upsert(candidate, city, ttl, now).map(UpsertOutcome::into_alert)
    }

    pub fn create_alert(
        &self,
        candidate: &CandidateAlert,
        city: &str,
        ttl: Option<Duration>,
    ) -> Result<Alert, StoreError> {
        self.create_alert_at(candidate, city, ttl, Utc::now())
    }

    fn upsert(
        &self,
        candidate: &CandidateAlert,
        city: &str,
        ttl: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome, StoreError> {
        let ttl = ttl.unwrap_or(self.settings.default_ttl);
        let expires_at = now
            .checked_add_signed(ttl)
            .filter(|_| ttl > Duration::zero())
            .ok_or(StoreError::InvalidTtl(ttl))?;
        let outcome = self.store.upsert_active(candidate, city, now, expires_at)?;

        let alert = outcome.alert();
        if outcome.is_created() {
            tracing::info!(
                city,
                parameter = %alert.parameter,
                severity = %alert.severity,
                alert_id = %alert.id,
                expires_at = %alert.expires_at,
                "Alert created"
            );
        } else {
            tracing::debug!(
                city,
                parameter = %alert.parameter,
                severity = %alert.severity,
                alert_id = %alert.id,
                expires_at = %alert.expires_at,
                "Alert refreshed"
            );
        }
        Ok(outcome)
    }

    /// Evaluates a snapshot and persists every candidate.
    ///
    /// Returns the live alert for each candidate (newly created or
    /// refreshed). Snapshots refused by the admission policy (simulated or
    /// stale) produce no alerts.
    pub fn check_and_create_alerts_at(
        &self,
        snapshot: &ReadingSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Vec<Alert>, PersistError> {
        match staleness::admit_at(snapshot, &self.settings.admission, now) {
            Admission::Accepted => {}
            Admission::Simulated => {
                tracing::warn!(city = %snapshot.city, "Refusing to raise alerts from simulated readings");
                return Ok(Vec::new());
            }
            Admission::Stale { age_minutes } => {
                tracing::warn!(city = %snapshot.city, age_minutes, "Refusing to raise alerts from stale readings");
                return Ok(Vec::new());
            }
        }

        let candidates = self.evaluate(snapshot);
        self.persist_candidates_at(candidates, &snapshot.city, now)
    }

    pub fn check_and_create_alerts(
        &self,
        snapshot: &ReadingSnapshot,
    ) -> Result<Vec<Alert>, PersistError> {
        self.check_and_create_alerts_at(snapshot, Utc::now())
    }

    /// Persists already-evaluated candidates with the default TTL. Stops at
    /// the first store failure so a struggling store is not hammered with
    /// the rest of the cycle.
    pub fn persist_candidates_at(
        &self,
        candidates: Vec<CandidateAlert>,
        city: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Alert>, PersistError> {
        let mut persisted = Vec::with_capacity(candidates.len());
        let mut created = 0;
        let mut remaining = candidates.into_iter();

        while let Some(candidate) = remaining.next() {
            match self.upsert(&candidate, city, None, now) {
                Ok(outcome) => {
                    if outcome.is_created() {
                        created += 1;
                    }
                    persisted.push(outcome.into_alert());
                }
                Err(source) => {
                    let mut pending = vec![candidate];
                    pending.extend(remaining);
                    logging::log_store_failure("create alert", Some(city), &source);
                    logging::log_cycle_summary(city, created, persisted.len() - created, pending.len());
                    return Err(PersistError {
                        city: city.to_string(),
                        persisted,
                        pending,
                        source,
                    });
                }
            }
        }

        logging::log_cycle_summary(city, created, persisted.len() - created, 0);
        Ok(persisted)
    }

    // -----------------------------------------------------------------------
    // Queries and transitions
    // -----------------------------------------------------------------------

    /// Active, unexpired alerts ordered by severity (highest first), then
    /// creation time (newest first).
    pub fn active_alerts_at(&self, now: DateTime<Utc>) -> Result<Vec<Alert>, StoreError> {
        let mut alerts = self.store.active_at(now).inspect_err(|e| {
            logging::log_store_failure("list active alerts", None, e);
        })?;
        alerts.sort_by_key(|a| (Reverse(a.severity), Reverse(a.created_at), a.id));
        Ok(alerts)
    }

    pub fn active_alerts(&self) -> Result<Vec<Alert>, StoreError> {
        self.active_alerts_at(Utc::now())
    }

    pub fn get(&self, id: Uuid) -> Result<Option<Alert>, StoreError> {
        self.store.get(id)
    }

    /// Stores existing alert records unchanged, e.g. when moving alerts from
    /// one store to another. Stops at the first failure.
    pub fn restore(&self, alerts: Vec<Alert>) -> Result<usize, StoreError> {
        let total = alerts.len();
        for alert in alerts {
            let id = alert.id;
            self.store.insert(alert).inspect_err(|e| {
                tracing::error!(alert_id = %id, error = %e, "Failed to restore alert");
            })?;
        }
        tracing::info!(count = total, "Restored alerts");
        Ok(total)
    }

    /// Manually deactivates an alert. Returns `false` if it was already
    /// inactive or does not exist.
    pub fn deactivate(&self, id: Uuid) -> Result<bool, StoreError> {
        let changed = self.store.deactivate(id).inspect_err(|e| {
            logging::log_store_failure("deactivate alert", None, e);
        })?;
        if changed {
            tracing::info!(alert_id = %id, "Alert deactivated");
        } else {
            tracing::debug!(alert_id = %id, "Alert already inactive or unknown");
        }
        Ok(changed)
    }

    /// Deactivates every alert past its expiry. Meant to be triggered on a
    /// fixed interval by the caller.
    pub fn expire_stale_at(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let count = self.store.expire_before(now).inspect_err(|e| {
            logging::log_store_failure("expire alerts", None, e);
        })?;
        if count > 0 {
            tracing::info!(count, "Expired stale alerts");
        }
        Ok(count)
    }

    pub fn expire_stale(&self) -> Result<usize, StoreError> {
        self.expire_stale_at(Utc::now())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
