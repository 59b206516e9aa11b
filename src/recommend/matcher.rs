//! Condition-to-content matching with general fallback padding.
//!
//! Matching runs in two passes that share one set of selected ids:
//! 1. condition pass: items whose range contains a present reading,
//!    ordered by priority then recency and cut to `limit`;
//! 2. fallback pass: GENERAL items ordered by featured flag then recency,
//!    appended until `limit` is reached or the pool runs out.
//!
//! The result never repeats an id and never exceeds `limit`.

use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;

use crate::model::ReadingSnapshot;
use crate::recommend::catalog::{Catalog, ConditionType, ContentItem};

/// Ranked recommendations: condition matches first, then general filler.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecommendationResult {
    pub items: Vec<ContentItem>,
    /// How many leading items came from the condition pass.
    pub matched_count: usize,
}

impl RecommendationResult {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn ids(&self) -> Vec<u64> {
        self.items.iter().map(|i| i.id).collect()
    }

    /// Items selected because they match current conditions.
    pub fn matched(&self) -> &[ContentItem] {
        &self.items[..self.matched_count]
    }

    /// GENERAL items used as padding.
    pub fn fallback(&self) -> &[ContentItem] {
        &self.items[self.matched_count..]
    }
}

/// Selects up to `limit` items for a snapshot.
pub fn recommend(snapshot: &ReadingSnapshot, catalog: &Catalog, limit: usize) -> RecommendationResult {
    if limit == 0 || catalog.is_empty() {
        return RecommendationResult::default();
    }

    let mut selected: HashSet<u64> = HashSet::new();

    // Condition pass.
    let mut matched: Vec<&ContentItem> = Vec::new();
    for condition_type in ConditionType::MATCHABLE {
        let Some(value) = condition_type.parameter().and_then(|p| snapshot.value(p)) else {
            continue;
        };
        for item in catalog.active_items() {
            if item.matches(condition_type, value) && !selected.contains(&item.id) {
                selected.insert(item.id);
                matched.push(item);
            }
        }
    }
    matched.sort_by_key(|i| (Reverse(i.priority), Reverse(i.published_at), i.id));
    matched.truncate(limit);

    // Only the kept matches count as selected for the fallback pass.
    selected = matched.iter().map(|i| i.id).collect();
    let matched_count = matched.len();

    // Fallback pass.
    let mut items: Vec<ContentItem> = matched.into_iter().cloned().collect();
    if items.len() < limit {
        let mut general: Vec<&ContentItem> = catalog
            .active_items()
            .filter(|i| i.is_general() && !selected.contains(&i.id))
            .collect();
        general.sort_by_key(|i| (Reverse(i.featured), Reverse(i.published_at), i.id));

        for item in general {
            if items.len() >= limit {
                break;
            }
            if selected.insert(item.id) {
                items.push(item.clone());
            }
        }
    }

    tracing::debug!(
        city = %snapshot.city,
        limit,
        matched = matched_count,
        fallback = items.len() - matched_count,
        "Recommendations selected"
    );

    RecommendationResult {
        items,
        matched_count,
    }
}

/// Holds the current catalog and answers recommendation requests.
///
/// The catalog is swapped as a whole; in-flight requests keep using the
/// catalog they started with.
pub struct Recommender {
    catalog: RwLock<Arc<Catalog>>,
    default_limit: usize,
}

impl Recommender {
    pub fn new(catalog: Catalog, default_limit: usize) -> Self {
        Self {
            catalog: RwLock::new(Arc::new(catalog)),
            default_limit,
        }
    }

    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    pub fn catalog(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn replace_catalog(&self, catalog: Catalog) {
        let items = catalog.len();
        *self.catalog.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(catalog);
        tracing::info!(items, "Content catalog replaced");
    }

    /// Recommends for a snapshot; `None` uses the configured default limit.
    pub fn recommend(&self, snapshot: &ReadingSnapshot, limit: Option<usize>) -> RecommendationResult {
        recommend(snapshot, &self.catalog(), limit.unwrap_or(self.default_limit))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
