/// Snapshot admission: staleness and simulated-data checks.
///
/// Alerts are only raised from fresh, observed readings. A snapshot that is
/// hours old, or that the provider adapter fabricated during an outage, is
/// refused before it reaches persistence, otherwise alerts could fire on
/// data that no longer (or never did) describe real conditions.
///
/// # Clock injection
/// All functions accept a `now: DateTime<Utc>` parameter rather than calling
/// `Utc::now()` internally, so admission is deterministic in tests.

use chrono::{DateTime, Utc};

use crate::model::ReadingSnapshot;

// ---------------------------------------------------------------------------
// Staleness check
// ---------------------------------------------------------------------------

/// Returns `true` if the snapshot is older than `max_age_minutes` relative
/// to `now`.
///
/// Staleness is strictly greater than the threshold:
///   age > max_age_minutes  →  stale
///   age == max_age_minutes →  not stale
///
/// Snapshots timestamped in the future are never stale.
pub fn is_stale_at(snapshot: &ReadingSnapshot, max_age_minutes: u64, now: DateTime<Utc>) -> bool {
    age_minutes(snapshot, now) > max_age_minutes as i64
}

/// Convenience wrapper that uses the real current time.
/// Use `is_stale_at` in tests to keep them deterministic.
pub fn is_stale(snapshot: &ReadingSnapshot, max_age_minutes: u64) -> bool {
    is_stale_at(snapshot, max_age_minutes, Utc::now())
}

fn age_minutes(snapshot: &ReadingSnapshot, now: DateTime<Utc>) -> i64 {
    (now - snapshot.timestamp).num_minutes()
}

// ---------------------------------------------------------------------------
// Admission
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionPolicy {
    pub refuse_simulated: bool,
    /// `None` disables the staleness check.
    pub max_age_minutes: Option<u64>,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            refuse_simulated: true,
            max_age_minutes: Some(180),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    Simulated,
    Stale { age_minutes: i64 },
}

impl Admission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Admission::Accepted)
    }
}

/// Decides whether alerts may be created from `snapshot`.
pub fn admit_at(snapshot: &ReadingSnapshot, policy: &AdmissionPolicy, now: DateTime<Utc>) -> Admission {
    if policy.refuse_simulated && snapshot.simulated {
        return Admission::Simulated;
    }
    if let Some(max_age) = policy.max_age_minutes {
        if is_stale_at(snapshot, max_age, now) {
            return Admission::Stale {
                age_minutes: age_minutes(snapshot, now),
            };
        }
    }
    Admission::Accepted
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
