//! Alerting: thresholds, evaluation, admission, persistence and lifecycle.
//!
//! Submodules:
//! - `thresholds`: validated boundary sets and the shared threshold store.
//! - `evaluator`: pure snapshot → candidate alert classification.
//! - `staleness`: refuses stale or simulated snapshots.
//! - `store`: the `AlertStore` trait and the in-memory store.
//! - `postgres_store`: PostgreSQL-backed `AlertStore`.
//! - `lifecycle`: `AlertManager` with dedup, expiry and deactivation.

pub mod evaluator;
pub mod lifecycle;
pub mod postgres_store;
pub mod staleness;
pub mod store;
pub mod thresholds;
