//! Content recommendations matched to current conditions.
//!
//! Submodules:
//! - `catalog`: validated content items and catalog loading.
//! - `matcher`: condition matching, ranking and general fallback padding.

pub mod catalog;
pub mod matcher;
