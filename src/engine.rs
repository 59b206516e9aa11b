//! The engine as seen by its callers: the scheduler, the dashboard alert
//! endpoint, the admin deactivation action and the content endpoint.
//!
//! ```no_run
//! use std::sync::Arc;
//! use envmon_service::alert::postgres_store::PostgresAlertStore;
//! use envmon_service::config::load_config;
//! use envmon_service::engine::Engine;
//! use envmon_service::recommend::catalog::Catalog;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("envmon.toml")?;
//! let store = PostgresAlertStore::connect_from_env(config.store_timeout())?;
//! let engine = Engine::new(&config, Arc::new(store), Catalog::load("catalog.json")?)?;
//! let alerts = engine.active_alerts()?;
//! # let _ = alerts;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use chrono::Duration;
use uuid::Uuid;

use crate::alert::lifecycle::{AlertManager, PersistError};
use crate::alert::store::{AlertStore, InMemoryAlertStore};
use crate::alert::thresholds::{ThresholdSet, ThresholdStore};
use crate::config::EngineConfig;
use crate::model::{Alert, CandidateAlert, ConfigError, Parameter, ReadingSnapshot, StoreError};
use crate::recommend::catalog::Catalog;
use crate::recommend::matcher::{RecommendationResult, Recommender};

pub struct Engine {
    thresholds: Arc<ThresholdStore>,
    alerts: AlertManager,
    recommender: Recommender,
}

impl Engine {
    /// Builds an engine over an explicit alert store. Fails only on invalid
    /// threshold configuration.
    pub fn new(
        config: &EngineConfig,
        store: Arc<dyn AlertStore>,
        catalog: Catalog,
    ) -> Result<Self, ConfigError> {
        let thresholds = Arc::new(config.threshold_store()?);
        let alerts = AlertManager::new(store, Arc::clone(&thresholds), config.lifecycle_settings()?);
        let recommender = Recommender::new(catalog, config.recommendations.default_limit);

        tracing::info!(
            parameters = thresholds.parameters().len(),
            catalog_items = recommender.catalog().len(),
            "Engine initialized"
        );

        Ok(Self {
            thresholds,
            alerts,
            recommender,
        })
    }

    /// An engine backed by a process-local alert store. Inactive alerts are
    /// dropped by `expire_stale` a week after they expire.
    pub fn in_memory(config: &EngineConfig, catalog: Catalog) -> Result<Self, ConfigError> {
        let store = InMemoryAlertStore::new().with_retention(Duration::days(7));
        Self::new(config, Arc::new(store), catalog)
    }

    pub fn alerts(&self) -> &AlertManager {
        &self.alerts
    }

    pub fn thresholds(&self) -> &ThresholdStore {
        &self.thresholds
    }

    pub fn recommender(&self) -> &Recommender {
        &self.recommender
    }

    /// Candidate alerts for a snapshot, without persisting anything.
    pub fn evaluate(&self, snapshot: &ReadingSnapshot) -> Vec<CandidateAlert> {
        self.alerts.evaluate(snapshot)
    }

    /// Called by the scheduler after each fresh reading.
    pub fn check_and_create_alerts(
        &self,
        snapshot: &ReadingSnapshot,
    ) -> Result<Vec<Alert>, PersistError> {
        self.alerts.check_and_create_alerts(snapshot)
    }

    pub fn active_alerts(&self) -> Result<Vec<Alert>, StoreError> {
        self.alerts.active_alerts()
    }

    pub fn deactivate(&self, id: Uuid) -> Result<bool, StoreError> {
        self.alerts.deactivate(id)
    }

    pub fn expire_stale(&self) -> Result<usize, StoreError> {
        self.alerts.expire_stale()
    }

    /// `None` uses the configured default limit.
    pub fn recommend(&self, snapshot: &ReadingSnapshot, limit: Option<usize>) -> RecommendationResult {
        self.recommender.recommend(snapshot, limit)
    }

    pub fn replace_threshold(&self, parameter: Parameter, set: ThresholdSet) {
        self.thresholds.replace(parameter, set);
    }

    pub fn replace_catalog(&self, catalog: Catalog) {
        self.recommender.replace_catalog(catalog);
    }
}
