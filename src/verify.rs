//! Catalog Coverage Verification
//!
//! Checks a content catalog against the configured thresholds to find
//! conditions that can raise alerts but have no content to recommend.
//!
//! Run this after loading a new catalog or changing thresholds.

use serde::Serialize;

use crate::alert::thresholds::ThresholdStore;
use crate::model::Parameter;
use crate::recommend::catalog::{Catalog, ConditionType};

// ============================================================================
// Coverage Results
// ============================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CoverageReport {
    pub conditions: Vec<ConditionCoverage>,
    pub general_items: usize,
    pub inactive_items: usize,
    pub status: CoverageStatus,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ConditionCoverage {
    pub condition_type: ConditionType,
    /// Parameters that alert on this condition and are configured.
    pub alerting_parameters: Vec<Parameter>,
    pub active_items: usize,
}

impl ConditionCoverage {
    /// Can alert, but nothing to recommend.
    pub fn is_gap(&self) -> bool {
        !self.alerting_parameters.is_empty() && self.active_items == 0
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum CoverageStatus {
    Complete,
    /// Some alerting conditions lack content, but general filler exists.
    Gaps,
    /// No general filler: some requests may come back empty.
    NoFallback,
}

// ============================================================================
// Coverage Check
// ============================================================================

pub fn coverage_report(thresholds: &ThresholdStore, catalog: &Catalog) -> CoverageReport {
    let configured = thresholds.parameters();

    let conditions: Vec<ConditionCoverage> = ConditionType::MATCHABLE
        .into_iter()
        .map(|condition_type| ConditionCoverage {
            condition_type,
            alerting_parameters: configured
                .iter()
                .copied()
                .filter(|p| ConditionType::for_parameter(*p) == condition_type)
                .collect(),
            active_items: catalog
                .active_items()
                .filter(|i| i.condition_type() == condition_type)
                .count(),
        })
        .collect();

    let general_items = catalog.active_items().filter(|i| i.is_general()).count();
    let inactive_items = catalog.items().iter().filter(|i| !i.active).count();

    let status = if general_items == 0 {
        CoverageStatus::NoFallback
    } else if conditions.iter().any(ConditionCoverage::is_gap) {
        CoverageStatus::Gaps
    } else {
        CoverageStatus::Complete
    };

    CoverageReport {
        conditions,
        general_items,
        inactive_items,
        status,
    }
}

/// Logs the report: one line per condition, warnings for gaps.
pub fn print_summary(report: &CoverageReport) {
    for c in &report.conditions {
        if c.is_gap() {
            tracing::warn!(
                condition = ?c.condition_type,
                "Condition can alert but has no active content"
            );
        } else {
            tracing::info!(
                condition = ?c.condition_type,
                items = c.active_items,
                alerting = c.alerting_parameters.len(),
                "Condition coverage"
            );
        }
    }
    tracing::info!(
        general = report.general_items,
        inactive = report.inactive_items,
        status = ?report.status,
        "Catalog coverage summary"
    );
}
