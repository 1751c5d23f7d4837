//! Experiment set aggregation.
//!
//! Sets and trials are append-only inputs; winners, lifts, and averages are
//! derived per read. Mutations to one set are serialized by its mutex,
//! independent sets never block each other.

use crate::error::{ExperimentError, ExperimentResult};
use crate::trial::{SetId, Trial};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// An experiment test set with its raw trials.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentSet {
    pub id: SetId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub trials: Vec<Trial>,
}

impl ExperimentSet {
    /// Mean lift across all trials, undefined lifts counting as zero.
    #[must_use]
    pub fn avg_improvement(&self) -> f64 {
        if self.trials.is_empty() {
            return 0.0;
        }
        let total: f64 = self.trials.iter().map(|t| t.outcome().lift_pct).sum();
        total / self.trials.len() as f64
    }
}

/// Summary row for set listings.
#[derive(Debug, Clone, Serialize)]
pub struct SetSummary {
    pub id: SetId,
    pub name: String,
    pub description: String,
    pub total_tests: usize,
    pub avg_improvement: f64,
    pub updated_at: DateTime<Utc>,
}

/// Aggregator for experiment sets.
pub struct ExperimentAggregator {
    /// Map of set ID to set handle.
    sets: RwLock<HashMap<SetId, Arc<Mutex<ExperimentSet>>>>,
}

impl fmt::Debug for ExperimentAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExperimentAggregator")
            .field("set_count", &self.sets.try_read().map(|s| s.len()).unwrap_or(0))
            .finish_non_exhaustive()
    }
}

impl ExperimentAggregator {
    /// Creates an empty aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self { sets: RwLock::new(HashMap::new()) }
    }

    /// Appends a trial to a set, creating the set on first use.
    ///
    /// # Errors
    /// Returns `Validation` for fewer than two variants, a zero-visitor
    /// variant with conversions, or conversions exceeding visitors.
    pub async fn record_trial(
        &self,
        set_id: &SetId,
        name: &str,
        description: &str,
        trial: Trial,
    ) -> ExperimentResult<()> {
        validate(&trial)?;

        let handle = self.set_handle(set_id, name, description).await;
        let mut set = handle.lock().await;
        debug!(set_id = %set_id, trial_id = %trial.id, trial = %trial.name, "Recorded trial");
        set.trials.push(trial);
        set.updated_at = Utc::now();
        Ok(())
    }

    /// Returns a set with its raw trials.
    pub async fn get_set(&self, set_id: &SetId) -> ExperimentResult<ExperimentSet> {
        let sets = self.sets.read().await;
        let handle =
            sets.get(set_id).ok_or_else(|| ExperimentError::NotFound(set_id.to_string()))?;
        let set = handle.lock().await;
        Ok(set.clone())
    }

    /// Lists set summaries, most recently updated first.
    pub async fn list_sets(&self) -> Vec<SetSummary> {
        let sets = self.sets.read().await;
        let mut out = Vec::with_capacity(sets.len());
        for handle in sets.values() {
            let set = handle.lock().await;
            out.push(SetSummary {
                id: set.id.clone(),
                name: set.name.clone(),
                description: set.description.clone(),
                total_tests: set.trials.len(),
                avg_improvement: set.avg_improvement(),
                updated_at: set.updated_at,
            });
        }
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        out
    }

    async fn set_handle(
        &self,
        set_id: &SetId,
        name: &str,
        description: &str,
    ) -> Arc<Mutex<ExperimentSet>> {
        if let Some(handle) = self.sets.read().await.get(set_id) {
            return handle.clone();
        }
        let mut sets = self.sets.write().await;
        sets.entry(set_id.clone())
            .or_insert_with(|| {
                info!(set_id = %set_id, name = %name, "Created experiment set");
                let now = Utc::now();
                Arc::new(Mutex::new(ExperimentSet {
                    id: set_id.clone(),
                    name: name.to_string(),
                    description: description.to_string(),
                    created_at: now,
                    updated_at: now,
                    trials: Vec::new(),
                }))
            })
            .clone()
    }
}

impl Default for ExperimentAggregator {
    fn default() -> Self {
        Self::new()
    }
}

fn validate(trial: &Trial) -> ExperimentResult<()> {
    if trial.variants.len() < 2 {
        return Err(ExperimentError::Validation(format!(
            "trial {} needs at least two variants",
            trial.name
        )));
    }
    for variant in &trial.variants {
        if variant.visitors == 0 && variant.conversions > 0 {
            return Err(ExperimentError::Validation(format!(
                "variant {} has conversions but no visitors",
                variant.name
            )));
        }
        if variant.conversions > variant.visitors {
            return Err(ExperimentError::Validation(format!(
                "variant {} has more conversions than visitors",
                variant.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trial::{TrialId, Variant};

    fn trial(name: &str, a: (u64, u64), b: (u64, u64)) -> Trial {
        Trial {
            id: TrialId::new(),
            name: name.to_string(),
            variants_label: "A vs B".to_string(),
            variants: vec![
                Variant { name: "A".to_string(), conversions: a.0, visitors: a.1 },
                Variant { name: "B".to_string(), conversions: b.0, visitors: b.1 },
            ],
        }
    }

    #[tokio::test]
    async fn test_set_created_on_first_trial() {
        let aggregator = ExperimentAggregator::new();
        let set_id = SetId::new();

        aggregator
            .record_trial(&set_id, "Buy Button", "Button color tests", trial("t1", (5, 50), (3, 50)))
            .await
            .unwrap();

        let set = aggregator.get_set(&set_id).await.unwrap();
        assert_eq!(set.name, "Buy Button");
        assert_eq!(set.trials.len(), 1);
    }

    #[tokio::test]
    async fn test_get_unknown_set() {
        let aggregator = ExperimentAggregator::new();
        let err = aggregator.get_set(&SetId::new()).await.unwrap_err();
        assert!(matches!(err, ExperimentError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_validation_rules() {
        let aggregator = ExperimentAggregator::new();
        let set_id = SetId::new();

        let single = Trial {
            id: TrialId::new(),
            name: "t1".to_string(),
            variants_label: "A".to_string(),
            variants: vec![Variant { name: "A".to_string(), conversions: 1, visitors: 10 }],
        };
        let err = aggregator.record_trial(&set_id, "s", "", single).await.unwrap_err();
        assert!(matches!(err, ExperimentError::Validation(_)));

        // Conversions without visitors.
        let err = aggregator
            .record_trial(&set_id, "s", "", trial("t2", (3, 0), (1, 10)))
            .await
            .unwrap_err();
        assert!(matches!(err, ExperimentError::Validation(_)));

        // More conversions than visitors.
        let err = aggregator
            .record_trial(&set_id, "s", "", trial("t3", (11, 10), (1, 10)))
            .await
            .unwrap_err();
        assert!(matches!(err, ExperimentError::Validation(_)));

        // Zero visitors with zero conversions is a legal (inert) variant.
        aggregator.record_trial(&set_id, "s", "", trial("t4", (1, 10), (0, 0))).await.unwrap();
    }

    #[tokio::test]
    async fn test_avg_improvement_is_mean_of_lifts() {
        let aggregator = ExperimentAggregator::new();
        let set_id = SetId::new();

        // 100% lift and an undefined (0) lift average to 50%.
        aggregator
            .record_trial(&set_id, "s", "", trial("t1", (20, 100), (10, 100)))
            .await
            .unwrap();
        aggregator
            .record_trial(&set_id, "s", "", trial("t2", (5, 100), (0, 100)))
            .await
            .unwrap();

        let set = aggregator.get_set(&set_id).await.unwrap();
        assert!((set.avg_improvement() - 50.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_derivation_is_idempotent_between_writes() {
        let aggregator = ExperimentAggregator::new();
        let set_id = SetId::new();
        aggregator
            .record_trial(&set_id, "s", "", trial("t1", (287, 2431), (240, 2301)))
            .await
            .unwrap();

        let first = aggregator.get_set(&set_id).await.unwrap();
        let second = aggregator.get_set(&set_id).await.unwrap();
        assert_eq!(first.trials[0].outcome(), second.trials[0].outcome());
        assert_eq!(first.avg_improvement(), second.avg_improvement());
    }

    #[tokio::test]
    async fn test_listing_orders_by_most_recent_update() {
        let aggregator = ExperimentAggregator::new();
        let first = SetId::new();
        let second = SetId::new();

        aggregator.record_trial(&first, "one", "", trial("t1", (5, 50), (3, 50))).await.unwrap();
        aggregator.record_trial(&second, "two", "", trial("t1", (5, 50), (3, 50))).await.unwrap();

        let sets = aggregator.list_sets().await;
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].id, second);
        assert_eq!(sets[1].id, first);

        // Touching the first set moves it back to the front.
        aggregator.record_trial(&first, "one", "", trial("t2", (9, 50), (3, 50))).await.unwrap();
        let sets = aggregator.list_sets().await;
        assert_eq!(sets[0].id, first);
        assert_eq!(sets[0].total_tests, 2);
    }
}
