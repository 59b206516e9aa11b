//! Content catalog consumed by the recommendation matcher.
//!
//! Catalog records arrive as loose JSON from the content-management side.
//! They are validated once, at load, into [`ContentItem`]s whose condition
//! is a tagged [`ContentCondition`]: either `General` (no range, filler
//! only) or `Ranged` with a finite, ordered `[min, max]`.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{ConfigError, Parameter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionType {
    AirQuality,
    Temperature,
    Humidity,
    Rainfall,
    UvIndex,
    General,
}

impl ConditionType {
    /// Condition types that can be matched against a snapshot reading.
    pub const MATCHABLE: [ConditionType; 5] = [
        ConditionType::AirQuality,
        ConditionType::Temperature,
        ConditionType::Humidity,
        ConditionType::Rainfall,
        ConditionType::UvIndex,
    ];

    /// The snapshot reading a condition type is matched against. Temperature
    /// content covers both heat and cold through its range.
    pub fn parameter(self) -> Option<Parameter> {
        match self {
            ConditionType::AirQuality => Some(Parameter::AirQuality),
            ConditionType::Temperature => Some(Parameter::Temperature),
            ConditionType::Humidity => Some(Parameter::Humidity),
            ConditionType::Rainfall => Some(Parameter::Rainfall),
            ConditionType::UvIndex => Some(Parameter::UvIndex),
            ConditionType::General => None,
        }
    }

    /// The condition type whose content addresses an alerting parameter.
    pub fn for_parameter(parameter: Parameter) -> ConditionType {
        match parameter {
            Parameter::AirQuality => ConditionType::AirQuality,
            Parameter::Temperature | Parameter::TemperatureCold => ConditionType::Temperature,
            Parameter::Humidity => ConditionType::Humidity,
            Parameter::Rainfall => ConditionType::Rainfall,
            Parameter::UvIndex => ConditionType::UvIndex,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentCondition {
    General,
    Ranged {
        condition_type: ConditionType,
        min: f64,
        max: f64,
    },
}

impl ContentCondition {
    pub fn condition_type(&self) -> ConditionType {
        match self {
            ContentCondition::General => ConditionType::General,
            ContentCondition::Ranged { condition_type, .. } => *condition_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: u64,
    pub title: String,
    pub condition: ContentCondition,
    pub priority: i32,
    pub published_at: DateTime<Utc>,
    /// Featured general items are used first when padding results.
    pub featured: bool,
    /// Inactive items are never recommended.
    pub active: bool,
}

impl ContentItem {
    /// A condition-specific item. Fails when `condition_type` is `General`,
    /// a bound is not finite, or `min > max`.
    pub fn ranged(
        id: u64,
        title: impl Into<String>,
        condition_type: ConditionType,
        min: f64,
        max: f64,
        priority: i32,
        published_at: DateTime<Utc>,
    ) -> Result<Self, ConfigError> {
        let condition = ranged_condition(id, condition_type, min, max)?;
        Ok(Self {
            id,
            title: title.into(),
            condition,
            priority,
            published_at,
            featured: false,
            active: true,
        })
    }

    /// A condition-agnostic filler item.
    pub fn general(id: u64, title: impl Into<String>, priority: i32, published_at: DateTime<Utc>) -> Self {
        Self {
            id,
            title: title.into(),
            condition: ContentCondition::General,
            priority,
            published_at,
            featured: false,
            active: true,
        }
    }

    pub fn with_featured(mut self, featured: bool) -> Self {
        self.featured = featured;
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn condition_type(&self) -> ConditionType {
        self.condition.condition_type()
    }

    pub fn is_general(&self) -> bool {
        matches!(self.condition, ContentCondition::General)
    }

    /// True when this item targets `condition_type` and `value` lies in its
    /// inclusive range. General items never match.
    pub fn matches(&self, condition_type: ConditionType, value: f64) -> bool {
        match self.condition {
            ContentCondition::Ranged {
                condition_type: ct,
                min,
                max,
            } => ct == condition_type && value >= min && value <= max,
            ContentCondition::General => false,
        }
    }
}

fn ranged_condition(
    id: u64,
    condition_type: ConditionType,
    min: f64,
    max: f64,
) -> Result<ContentCondition, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidContent { id, reason };

    if condition_type == ConditionType::General {
        return Err(invalid("GENERAL content cannot carry a condition range".to_string()));
    }
    if !min.is_finite() || !max.is_finite() {
        return Err(invalid(format!("condition range [{}, {}] is not finite", min, max)));
    }
    if min > max {
        return Err(invalid(format!("conditionMin {} exceeds conditionMax {}", min, max)));
    }
    Ok(ContentCondition::Ranged {
        condition_type,
        min,
        max,
    })
}

// ---------------------------------------------------------------------------
// Wire records
// ---------------------------------------------------------------------------

/// One catalog entry as produced by the content-management subsystem.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentRecord {
    id: u64,
    title: String,
    condition_type: ConditionType,
    #[serde(default)]
    condition_min: Option<f64>,
    #[serde(default)]
    condition_max: Option<f64>,
    #[serde(default)]
    priority: i32,
    published_at: DateTime<Utc>,
    #[serde(default)]
    featured: bool,
    #[serde(default = "default_true")]
    active: bool,
}

fn default_true() -> bool {
    true
}

impl TryFrom<ContentRecord> for ContentItem {
    type Error = ConfigError;

    fn try_from(record: ContentRecord) -> Result<Self, Self::Error> {
        let condition = match (record.condition_type, record.condition_min, record.condition_max) {
            (ConditionType::General, None, None) => ContentCondition::General,
            (ConditionType::General, _, _) => {
                return Err(ConfigError::InvalidContent {
                    id: record.id,
                    reason: "GENERAL content cannot carry conditionMin/conditionMax".to_string(),
                });
            }
            (ct, Some(min), Some(max)) => ranged_condition(record.id, ct, min, max)?,
            (ct, _, _) => {
                return Err(ConfigError::InvalidContent {
                    id: record.id,
                    reason: format!("{:?} content needs both conditionMin and conditionMax", ct),
                });
            }
        };

        Ok(ContentItem {
            id: record.id,
            title: record.title,
            condition,
            priority: record.priority,
            published_at: record.published_at,
            featured: record.featured,
            active: record.active,
        })
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// A validated, read-only set of content items with unique ids.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    items: Vec<ContentItem>,
}

impl Catalog {
    pub fn new(items: Vec<ContentItem>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for item in &items {
            if !seen.insert(item.id) {
                return Err(ConfigError::InvalidContent {
                    id: item.id,
                    reason: "duplicate id in catalog".to_string(),
                });
            }
        }
        Ok(Self { items })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses a JSON array of catalog records.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let records: Vec<ContentRecord> = serde_json::from_str(json)?;
        let items = records
            .into_iter()
            .map(ContentItem::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(items)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_json(&text)?;
        tracing::info!(path = %path.display(), items = catalog.len(), "Loaded content catalog");
        Ok(catalog)
    }

    pub fn items(&self) -> &[ContentItem] {
        &self.items
    }

    pub fn active_items(&self) -> impl Iterator<Item = &ContentItem> {
        self.items.iter().filter(|i| i.active)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
