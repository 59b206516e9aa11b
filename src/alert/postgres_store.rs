//! PostgreSQL-backed alert store.
//!
//! The dedup-and-create sequence runs in one transaction that first takes
//! `pg_advisory_xact_lock` on the `(type, parameter, city)` tuple, so two
//! processes evaluating the same city serialize on that key only. The
//! partial unique index in `sql/001_alerts.sql` backs this up at the table
//! level.

use std::sync::{Mutex, MutexGuard, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use postgres::error::SqlState;
use postgres::{Client, GenericClient, Row};
use uuid::Uuid;

use crate::alert::store::{AlertStore, UpsertOutcome};
use crate::db;
use crate::model::{Alert, AlertKey, AlertType, CandidateAlert, Parameter, Severity, StoreError};

const ALERT_COLUMNS: &str =
    "id, alert_type, parameter, severity, city, message, created_at, expires_at, is_active";

const LOCK_POLL: Duration = Duration::from_millis(5);

pub struct PostgresAlertStore {
    client: Mutex<Client>,
    timeout: Duration,
    timeout_ms: u64,
}

impl PostgresAlertStore {
    /// Wraps an open connection. `timeout` should match the connection's
    /// `statement_timeout` (see [`db::connect`]); it is only used to report
    /// timeouts.
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self {
            client: Mutex::new(client),
            timeout,
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    /// Connects via `DATABASE_URL` and applies the schema.
    pub fn connect_from_env(timeout: Duration) -> Result<Self, StoreError> {
        let client = db::connect_and_prepare(timeout)?;
        Ok(Self::new(client, timeout))
    }

    /// The shared connection, waited for no longer than the store timeout.
    fn client(&self) -> Result<MutexGuard<'_, Client>, StoreError> {
        lock_within(&self.client, self.timeout)
    }

    /// Maps a cancelled statement to `Timeout` and a dropped connection to
    /// `Unavailable`.
    fn fail(&self, e: postgres::Error) -> StoreError {
        if e.code() == Some(&SqlState::QUERY_CANCELED) {
            StoreError::Timeout(self.timeout_ms)
        } else if e.is_closed() {
            StoreError::Unavailable(e.to_string())
        } else {
            StoreError::Database(e)
        }
    }
}

/// Polls `mutex` until it is free or `timeout` has passed. A call queued
/// behind slow statements fails with `Timeout` instead of waiting on them.
fn lock_within<T>(mutex: &Mutex<T>, timeout: Duration) -> Result<MutexGuard<'_, T>, StoreError> {
    let deadline = Instant::now() + timeout;
    loop {
        match mutex.try_lock() {
            Ok(guard) => return Ok(guard),
            Err(TryLockError::Poisoned(_)) => {
                return Err(StoreError::Unavailable("connection lock poisoned".to_string()));
            }
            Err(TryLockError::WouldBlock) if Instant::now() >= deadline => {
                let timeout_ms = timeout.as_millis() as u64;
                tracing::warn!(timeout_ms, "Timed out waiting for the alert store connection");
                return Err(StoreError::Timeout(timeout_ms));
            }
            Err(TryLockError::WouldBlock) => thread::sleep(LOCK_POLL),
        }
    }
}

const INSERT_ALERT: &str = "INSERT INTO envmon.alerts
     (id, alert_type, parameter, severity, city, message, created_at, expires_at, is_active)
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)";

fn insert_row<C: GenericClient>(conn: &mut C, alert: &Alert) -> Result<u64, postgres::Error> {
    conn.execute(
        INSERT_ALERT,
        &[
            &alert.id,
            &alert.alert_type.as_str(),
            &alert.parameter.as_str(),
            &alert.severity.as_str(),
            &alert.city,
            &alert.message,
            &alert.created_at,
            &alert.expires_at,
            &alert.is_active,
        ],
    )
}

fn row_to_alert(row: &Row) -> Result<Alert, StoreError> {
    let alert_type: String = row.try_get("alert_type")?;
    let parameter: String = row.try_get("parameter")?;
    let severity: String = row.try_get("severity")?;

    Ok(Alert {
        id: row.try_get("id")?,
        alert_type: alert_type.parse::<AlertType>()?,
        parameter: parameter.parse::<Parameter>()?,
        severity: severity.parse::<Severity>()?,
        city: row.try_get("city")?,
        message: row.try_get("message")?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
        is_active: row.try_get("is_active")?,
    })
}

impl AlertStore for PostgresAlertStore {
    fn upsert_active(
        &self,
        candidate: &CandidateAlert,
        city: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<UpsertOutcome, StoreError> {
        let key = AlertKey::new(candidate.alert_type, candidate.parameter, city);
        let mut client = self.client()?;
        let mut tx = client.transaction().map_err(|e| self.fail(e))?;

        tx.execute("SELECT pg_advisory_xact_lock(hashtext($1))", &[&key.to_string()])
            .map_err(|e| self.fail(e))?;

        let existing = tx
            .query_opt(
                &format!(
                    "SELECT {ALERT_COLUMNS} FROM envmon.alerts
                     WHERE alert_type = $1 AND parameter = $2 AND city = $3 AND is_active
                     FOR UPDATE"
                ),
                &[&candidate.alert_type.as_str(), &candidate.parameter.as_str(), &city],
            )
            .map_err(|e| self.fail(e))?;

        if let Some(row) = existing {
            let current = row_to_alert(&row)?;
            if current.is_live_at(now) {
                let row = tx
                    .query_one(
                        &format!(
                            "UPDATE envmon.alerts
                             SET expires_at = $2, severity = $3, message = $4
                             WHERE id = $1
                             RETURNING {ALERT_COLUMNS}"
                        ),
                        &[
                            &current.id,
                            &expires_at,
                            &candidate.severity.as_str(),
                            &candidate.message,
                        ],
                    )
                    .map_err(|e| self.fail(e))?;
                let refreshed = row_to_alert(&row)?;
                tx.commit().map_err(|e| self.fail(e))?;
                return Ok(UpsertOutcome::Refreshed(refreshed));
            }

            tx.execute(
                "UPDATE envmon.alerts SET is_active = FALSE WHERE id = $1",
                &[&current.id],
            )
            .map_err(|e| self.fail(e))?;
        }

        let alert = Alert::from_candidate(candidate, city, now, expires_at);
        insert_row(&mut tx, &alert).map_err(|e| self.fail(e))?;
        tx.commit().map_err(|e| self.fail(e))?;

        Ok(UpsertOutcome::Created(alert))
    }

    fn insert(&self, alert: Alert) -> Result<(), StoreError> {
        let mut client = self.client()?;
        insert_row(&mut *client, &alert).map_err(|e| {
            if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
                StoreError::Conflict(alert.key().to_string())
            } else {
                self.fail(e)
            }
        })?;
        Ok(())
    }

    fn get(&self, id: Uuid) -> Result<Option<Alert>, StoreError> {
        let mut client = self.client()?;
        let row = client
            .query_opt(
                &format!("SELECT {ALERT_COLUMNS} FROM envmon.alerts WHERE id = $1"),
                &[&id],
            )
            .map_err(|e| self.fail(e))?;
        row.as_ref().map(row_to_alert).transpose()
    }

    fn active_at(&self, now: DateTime<Utc>) -> Result<Vec<Alert>, StoreError> {
        let mut client = self.client()?;
        let rows = client
            .query(
                &format!(
                    "SELECT {ALERT_COLUMNS} FROM envmon.alerts
                     WHERE is_active AND expires_at > $1"
                ),
                &[&now],
            )
            .map_err(|e| self.fail(e))?;
        rows.iter().map(row_to_alert).collect()
    }

    fn deactivate(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut client = self.client()?;
        let updated = client
            .execute(
                "UPDATE envmon.alerts SET is_active = FALSE WHERE id = $1 AND is_active",
                &[&id],
            )
            .map_err(|e| self.fail(e))?;
        Ok(updated == 1)
    }

    fn expire_before(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut client = self.client()?;
        let updated = client
            .execute(
                "UPDATE envmon.alerts SET is_active = FALSE
                 WHERE is_active AND expires_at <= $1",
                &[&now],
            )
            .map_err(|e| self.fail(e))?;
        Ok(updated as usize)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
