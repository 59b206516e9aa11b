//! Environmental alert and recommendation engine.
//!
//! Takes normalized reading snapshots (air quality, temperature, humidity,
//! rainfall, UV) and produces:
//! - alerts, when readings cross configured severity thresholds, with
//!   deduplication, expiry and manual deactivation;
//! - content recommendations matched to current conditions, padded with
//!   general content.
//!
//! Fetching readings, scheduling and rendering belong to the caller.

pub mod alert;
pub mod config;
pub mod db;
pub mod engine;
pub mod logging;
pub mod model;
pub mod parameters;
pub mod recommend;
pub mod verify;
