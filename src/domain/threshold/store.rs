//! Versioned, provenance-tracked threshold storage (spec §4.G).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::domain::errors::ThresholdError;
use super::discovery::DiscoveryMethod;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThresholdStatus {
    Hypothesis,
    Validated,
    Overfitted,
    Deprecated,
    Active,
}

/// A single threshold with the provenance needed to audit it later: how it
/// was discovered, how it performed, and when it's next due for review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub name: String,
    pub value: f64,
    pub method: DiscoveryMethod,
    pub date_set: DateTime<Utc>,
    pub rationale: String,
    pub in_sample_sharpe: f64,
    pub in_sample_win_rate: f64,
    pub trades_per_month: f64,
    pub out_of_sample_sharpe: Option<f64>,
    pub validation_degradation_pct: Option<f64>,
    pub status: ThresholdStatus,
    pub sensitivity_range_pct: Option<f64>,
    pub is_robust: bool,
    pub review_date: Option<DateTime<Utc>>,
    pub regime: Option<String>,
    pub version: u32,
    pub notes: Option<String>,
}

/// A cohesive group of thresholds belonging to one strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdSet {
    pub strategy_name: String,
    pub thresholds: HashMap<String, ThresholdConfig>,
    pub created_at: DateTime<Utc>,
    pub version: u32,
    pub description: Option<String>,
}

impl ThresholdSet {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.thresholds.get(name).map(|c| c.value)
    }
}

/// Stores, versions, and schedules review of threshold configurations.
/// Saving under a name already in use creates a new version rather than
/// overwriting (spec §4.G).
pub trait ThresholdStore {
    fn save(&self, config: ThresholdConfig) -> u64;
    fn active_threshold(&self, name: &str, regime: Option<&str>) -> Option<ThresholdConfig>;
    fn history(&self, name: &str, limit: usize) -> Vec<ThresholdConfig>;
    fn due_for_review(&self, now: DateTime<Utc>) -> Vec<ThresholdConfig>;
    fn save_set(&self, set: ThresholdSet) -> usize {
        let mut count = 0;
        for config in set.thresholds.into_values() {
            self.save(config);
            count += 1;
        }
        count
    }
    fn load_set(&self, strategy_name: &str, names: &[&str], created_at: DateTime<Utc>) -> Option<ThresholdSet> {
        let mut thresholds = HashMap::new();
        for &name in names {
            if let Some(config) = self.active_threshold(name, None) {
                thresholds.insert(name.to_string(), config);
            }
        }
        if thresholds.is_empty() {
            return None;
        }
        Some(ThresholdSet {
            strategy_name: strategy_name.to_string(),
            thresholds,
            created_at,
            version: 1,
            description: None,
        })
    }
}

#[derive(Debug, Clone)]
struct StoredRecord {
    id: u64,
    config: ThresholdConfig,
}

/// In-memory `ThresholdStore`. Versions are append-only per name; the
/// highest-version non-deprecated record is the active one.
#[derive(Default)]
pub struct InMemoryThresholdStore {
    inner: Mutex<InnerStore>,
}

#[derive(Default)]
struct InnerStore {
    next_id: u64,
    records: HashMap<String, Vec<StoredRecord>>,
}

impl InMemoryThresholdStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ThresholdStore for InMemoryThresholdStore {
    fn save(&self, mut config: ThresholdConfig) -> u64 {
        let mut inner = self.inner.lock();
        let versions = inner.records.entry(config.name.clone()).or_default();
        let next_version = versions.iter().map(|r| r.config.version).max().unwrap_or(0) + 1;
        config.version = next_version;

        let id = inner.next_id;
        inner.next_id += 1;

        inner.records.get_mut(&config.name).unwrap().push(StoredRecord { id, config });
        id
    }

    fn active_threshold(&self, name: &str, regime: Option<&str>) -> Option<ThresholdConfig> {
        let inner = self.inner.lock();
        inner
            .records
            .get(name)?
            .iter()
            .filter(|r| r.config.status != ThresholdStatus::Deprecated)
            .filter(|r| regime.is_none() || r.config.regime.as_deref() == regime)
            .max_by_key(|r| r.config.version)
            .map(|r| r.config.clone())
    }

    fn history(&self, name: &str, limit: usize) -> Vec<ThresholdConfig> {
        let inner = self.inner.lock();
        let Some(versions) = inner.records.get(name) else {
            return Vec::new();
        };
        let mut sorted: Vec<&StoredRecord> = versions.iter().collect();
        sorted.sort_by(|a, b| b.config.version.cmp(&a.config.version));
        sorted.into_iter().take(limit).map(|r| r.config.clone()).collect()
    }

    fn due_for_review(&self, now: DateTime<Utc>) -> Vec<ThresholdConfig> {
        let inner = self.inner.lock();
        inner
            .records
            .values()
            .flatten()
            .filter(|r| r.config.review_date.is_some_and(|d| d <= now))
            .map(|r| r.config.clone())
            .collect()
    }
}

pub fn export_to_json(set: &ThresholdSet) -> Result<String, ThresholdError> {
    serde_json::to_string_pretty(set).map_err(|e| ThresholdError::ImportFailed { reason: e.to_string() })
}

pub fn import_from_json(data: &str) -> Result<ThresholdSet, ThresholdError> {
    serde_json::from_str(data).map_err(|e| ThresholdError::ImportFailed { reason: e.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn config(name: &str, status: ThresholdStatus, review_date: Option<DateTime<Utc>>) -> ThresholdConfig {
        ThresholdConfig {
            name: name.to_string(),
            value: 0.05,
            method: DiscoveryMethod::GridSearch,
            date_set: Utc::now(),
            rationale: "test".to_string(),
            in_sample_sharpe: 1.5,
            in_sample_win_rate: 0.6,
            trades_per_month: 12.0,
            out_of_sample_sharpe: None,
            validation_degradation_pct: None,
            status,
            sensitivity_range_pct: None,
            is_robust: false,
            review_date,
            regime: None,
            version: 0,
            notes: None,
        }
    }

    #[test]
    fn saving_the_same_name_twice_creates_a_new_version() {
        let store = InMemoryThresholdStore::new();
        store.save(config("oi_drop_pct", ThresholdStatus::Active, None));
        store.save(config("oi_drop_pct", ThresholdStatus::Active, None));

        let history = store.history("oi_drop_pct", 10);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].version, 2);
        assert_eq!(history[1].version, 1);
    }

    #[test]
    fn active_threshold_skips_deprecated_versions() {
        let store = InMemoryThresholdStore::new();
        store.save(config("oi_drop_pct", ThresholdStatus::Active, None));
        store.save(config("oi_drop_pct", ThresholdStatus::Deprecated, None));

        let active = store.active_threshold("oi_drop_pct", None).unwrap();
        assert_eq!(active.version, 1);
    }

    #[test]
    fn due_for_review_finds_past_dates_only() {
        let store = InMemoryThresholdStore::new();
        let now = Utc::now();
        store.save(config("past_due", ThresholdStatus::Active, Some(now - Duration::days(1))));
        store.save(config("not_due", ThresholdStatus::Active, Some(now + Duration::days(30))));

        let due = store.due_for_review(now);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].name, "past_due");
    }

    #[test]
    fn export_then_import_round_trips_a_threshold_set() {
        let mut thresholds = HashMap::new();
        thresholds.insert("cascade_oi_drop_pct".to_string(), config("cascade_oi_drop_pct", ThresholdStatus::Validated, None));
        let set = ThresholdSet {
            strategy_name: "cascade_reversal".to_string(),
            thresholds,
            created_at: Utc::now(),
            version: 1,
            description: Some("conservative defaults".to_string()),
        };

        let json = export_to_json(&set).unwrap();
        let imported = import_from_json(&json).unwrap();

        assert_eq!(imported.strategy_name, set.strategy_name);
        assert_eq!(imported.thresholds.len(), 1);
        assert_eq!(imported.thresholds["cascade_oi_drop_pct"].status, ThresholdStatus::Validated);
    }

    #[test]
    fn import_rejects_malformed_json() {
        let result = import_from_json("not json");
        assert!(result.is_err());
    }
}
