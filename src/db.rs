/// PostgreSQL connection helpers.
///
/// The connection string comes from `DATABASE_URL` (a `.env` file in the
/// working directory is honoured). Every connection opened here carries a
/// session `statement_timeout`, so a slow database bounds each alert store
/// call instead of stalling the evaluation cycle that made it.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use postgres::{Client, Config, NoTls};

use crate::model::StoreError;

/// Schema for the alert table, applied by [`ensure_schema`].
pub const SCHEMA_SQL: &str = include_str!("../sql/001_alerts.sql");

/// Reads `DATABASE_URL` from the environment or `.env`.
pub fn database_url() -> Result<String, StoreError> {
    dotenv::dotenv().ok();
    env::var("DATABASE_URL")
        .map_err(|_| StoreError::Unavailable("DATABASE_URL is not set".to_string()))
}

/// Opens a connection whose connect and statement times are bounded by
/// `timeout`.
pub fn connect(database_url: &str, timeout: Duration) -> Result<Client, StoreError> {
    let mut config = Config::from_str(database_url)?;
    config.connect_timeout(timeout);
    config.options(&format!("-c statement_timeout={}", timeout.as_millis()));

    let client = config.connect(NoTls).map_err(|e| {
        tracing::error!(error = %e, "Failed to connect to alert database");
        StoreError::Unavailable(e.to_string())
    })?;
    tracing::info!(timeout_ms = timeout.as_millis() as u64, "Connected to alert database");
    Ok(client)
}

/// Creates the `envmon` schema and alert table if they do not exist.
pub fn ensure_schema(client: &mut Client) -> Result<(), StoreError> {
    client.batch_execute(SCHEMA_SQL)?;
    Ok(())
}

/// Connects using `DATABASE_URL` and makes sure the schema exists.
pub fn connect_and_prepare(timeout: Duration) -> Result<Client, StoreError> {
    let url = database_url()?;
    let mut client = connect(&url, timeout)?;
    ensure_schema(&mut client)?;
    Ok(client)
}
