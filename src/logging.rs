/// Structured logging for the alert engine
///
/// Installs a `tracing` subscriber (console or file, text or JSON) and
/// provides the few logging helpers that carry engine-specific policy:
/// store failure classification and per-cycle summaries.

use std::fmt;
use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::config::LoggingConfig;
use crate::model::{ConfigError, StoreError};

// ---------------------------------------------------------------------------
// Initialization
// ---------------------------------------------------------------------------

/// Installs the global subscriber.
///
/// `RUST_LOG` takes precedence over `config.level`. When `config.file` is
/// set, output is appended to that file instead of stderr. Calling this
/// more than once leaves the first subscriber in place.
pub fn init_logging(config: &LoggingConfig) -> Result<(), ConfigError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| ConfigError::Invalid(format!("log level '{}': {}", config.level, e)))?;

    let writer = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| ConfigError::Io {
                    path: path.clone(),
                    source,
                })?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(config.file.is_none());

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if installed.is_err() {
        tracing::debug!("Logging already initialized; keeping existing subscriber");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - the store is slow; skip this cycle and retry next interval
    Expected,
    /// Unexpected failure - the store is down, misconfigured, or returned bad data
    Unexpected,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
        }
    }
}

pub fn classify_store_failure(err: &StoreError) -> FailureType {
    match err {
        StoreError::Timeout(_) => FailureType::Expected,
        StoreError::Unavailable(_)
        | StoreError::Database(_)
        | StoreError::Corrupt(_)
        | StoreError::Conflict(_)
        | StoreError::InvalidTtl(_) => FailureType::Unexpected,
    }
}

/// Logs an alert store failure at a level matching its classification.
pub fn log_store_failure(operation: &str, city: Option<&str>, err: &StoreError) {
    let failure_type = classify_store_failure(err);
    let city = city.unwrap_or("-");

    match failure_type {
        FailureType::Expected => tracing::warn!(
            operation,
            city,
            failure = %failure_type,
            error = %err,
            "Alert store operation failed"
        ),
        FailureType::Unexpected => tracing::error!(
            operation,
            city,
            failure = %failure_type,
            error = %err,
            "Alert store operation failed"
        ),
    }
}

// ---------------------------------------------------------------------------
// Cycle Summary Logging
// ---------------------------------------------------------------------------

/// Level a cycle summary is logged at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryLevel {
    Debug,
    Info,
    Warn,
    Error,
}

pub fn cycle_summary_level(created: usize, refreshed: usize, failed: usize) -> SummaryLevel {
    let succeeded = created + refreshed;
    if failed == 0 && succeeded == 0 {
        SummaryLevel::Debug
    } else if failed == 0 {
        SummaryLevel::Info
    } else if succeeded == 0 {
        SummaryLevel::Error
    } else {
        SummaryLevel::Warn
    }
}

/// Logs the outcome of persisting one snapshot's candidates.
pub fn log_cycle_summary(city: &str, created: usize, refreshed: usize, failed: usize) {
    macro_rules! summary {
        ($level:ident) => {
            tracing::$level!(city, created, refreshed, failed, "Alert cycle complete")
        };
    }

    match cycle_summary_level(created, refreshed, failed) {
        SummaryLevel::Debug => summary!(debug),
        SummaryLevel::Info => summary!(info),
        SummaryLevel::Warn => summary!(warn),
        SummaryLevel::Error => summary!(error),
    }
}
