//! Read-side composition of the four response shapes the UI consumes.
//!
//! The façade never leaks internal errors to the read endpoints: unknown
//! names resolve to empty results. Only a lineage invariant breach (a
//! locking bug, not a bad request) propagates.

use crate::error::ApiError;
use chrono::{DateTime, Utc};
use flywheel_experiments::{ExperimentAggregator, SetId, TrialId};
use flywheel_registry::{ModelId, ModelKind, ModelRegistry, ModelStatus};
use flywheel_training::{JobScheduler, LossSample, MetricRecorder};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseModelRow {
    pub id: ModelId,
    pub model_name: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FineTuneRow {
    pub id: ModelId,
    pub model_name: String,
    pub timestamp: DateTime<Utc>,
    pub status: ModelStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbTestRow {
    pub id: TrialId,
    pub name: String,
    pub variant: String,
    pub winner: String,
    pub improvement: String,
    /// Set when the lift is undefined (losing rate was exactly zero).
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub flagged: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbTestSet {
    pub id: SetId,
    pub name: String,
    pub description: String,
    pub total_tests: usize,
    pub avg_improvement: String,
    pub tests: Vec<AbTestRow>,
}

/// Read façade over the registry, scheduler, recorder, and aggregator.
#[derive(Debug, Clone)]
pub struct QueryFacade {
    registry: Arc<ModelRegistry>,
    scheduler: Arc<JobScheduler>,
    recorder: Arc<MetricRecorder>,
    experiments: Arc<ExperimentAggregator>,
}

impl QueryFacade {
    #[must_use]
    pub fn new(
        registry: Arc<ModelRegistry>,
        scheduler: Arc<JobScheduler>,
        recorder: Arc<MetricRecorder>,
        experiments: Arc<ExperimentAggregator>,
    ) -> Self {
        Self { registry, scheduler, recorder, experiments }
    }

    /// Base models, newest first.
    pub async fn base_models(&self) -> Vec<BaseModelRow> {
        self.registry
            .list_base()
            .await
            .into_iter()
            .map(|m| BaseModelRow { id: m.id, model_name: m.name, timestamp: m.created_at })
            .collect()
    }

    /// Fine-tuned models with their active/archived status, newest first.
    ///
    /// Audits the activation invariant while assembling the rows: two Active
    /// models under one lineage root means a locking bug, surfaced as an
    /// invariant breach rather than a normal response.
    pub async fn fine_tunes(&self) -> Result<Vec<FineTuneRow>, ApiError> {
        let mut active_roots = std::collections::HashSet::new();
        let mut rows = Vec::new();
        for m in self.registry.list_fine_tuned().await {
            let Some(status) = m.status else { continue };
            if status == ModelStatus::Active {
                let root = self.registry.lineage_root(&m.id).await?;
                if !active_roots.insert(root.clone()) {
                    return Err(ApiError::InvariantBreach(format!(
                        "multiple active models in lineage {root}"
                    )));
                }
            }
            rows.push(FineTuneRow {
                id: m.id,
                model_name: m.name,
                timestamp: m.created_at,
                status,
            });
        }
        Ok(rows)
    }

    /// Loss series for a model by display name, ordered by epoch.
    ///
    /// Empty for base models (which have no loss history), unknown names,
    /// and models without a recorded training job.
    pub async fn loss_data(&self, model_name: &str) -> Vec<LossSample> {
        let Some(model) = self.registry.find_by_name(model_name).await else {
            return Vec::new();
        };
        if model.kind == ModelKind::Base {
            return Vec::new();
        }
        let Some(job_id) = self.scheduler.job_for_model(&model.id).await else {
            return Vec::new();
        };
        self.recorder.get_series(&job_id).await
    }

    /// All experiment sets with derived per-trial and per-set values,
    /// most recently updated first.
    pub async fn ab_tests(&self) -> Vec<AbTestSet> {
        let mut out = Vec::new();
        for summary in self.experiments.list_sets().await {
            // A set listed a moment ago can only be missing if removed by
            // retention; skip rather than fail the whole listing.
            let Ok(set) = self.experiments.get_set(&summary.id).await else {
                continue;
            };
            let tests = set
                .trials
                .iter()
                .map(|trial| {
                    let outcome = trial.outcome();
                    AbTestRow {
                        id: trial.id.clone(),
                        name: trial.name.clone(),
                        variant: trial.variants_label.clone(),
                        winner: outcome.winner,
                        improvement: format_improvement(outcome.lift_pct, outcome.lift_defined),
                        flagged: !outcome.lift_defined,
                    }
                })
                .collect();
            out.push(AbTestSet {
                id: set.id.clone(),
                name: set.name.clone(),
                description: set.description.clone(),
                total_tests: set.trials.len(),
                avg_improvement: format_improvement(set.avg_improvement(), true),
                tests,
            });
        }
        out
    }
}

/// Formats a lift percentage the way the UI displays it: "+12.9%", or "0%"
/// for zero and undefined lifts.
fn format_improvement(lift_pct: f64, defined: bool) -> String {
    if !defined || lift_pct <= 0.0 {
        return "0%".to_string();
    }
    format!("+{lift_pct:.1}%")
}

#[cfg(test)]
mod tests {
    use super::*;
    use flywheel_experiments::{Trial, Variant};

    fn components() -> (Arc<ModelRegistry>, Arc<JobScheduler>, Arc<MetricRecorder>, Arc<ExperimentAggregator>)
    {
        let registry = Arc::new(ModelRegistry::new());
        let scheduler = Arc::new(JobScheduler::new(registry.clone()));
        let recorder = Arc::new(MetricRecorder::new(scheduler.clone()));
        let experiments = Arc::new(ExperimentAggregator::new());
        (registry, scheduler, recorder, experiments)
    }

    fn facade_of(
        parts: &(
            Arc<ModelRegistry>,
            Arc<JobScheduler>,
            Arc<MetricRecorder>,
            Arc<ExperimentAggregator>,
        ),
    ) -> QueryFacade {
        QueryFacade::new(parts.0.clone(), parts.1.clone(), parts.2.clone(), parts.3.clone())
    }

    #[tokio::test]
    async fn test_loss_data_flows_from_job_to_model_name() {
        let parts = components();
        let (registry, scheduler, recorder, _) = &parts;
        let facade = facade_of(&parts);

        let base = registry.register_base("qwen-coder-7b").await.unwrap();
        let job = scheduler.submit(&base.id).await.unwrap();
        scheduler.start(&job.id).await.unwrap();
        recorder.append_sample(&job.id, 1, 2.45).await.unwrap();
        recorder.append_sample(&job.id, 2, 2.12).await.unwrap();
        scheduler.complete(&job.id, "flywheel-v1.0").await.unwrap();

        let series = facade.loss_data("flywheel-v1.0").await;
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].epoch, 1);
        assert_eq!(series[1].loss, 2.12);

        // Base models and unknown names are empty, not errors.
        assert!(facade.loss_data("qwen-coder-7b").await.is_empty());
        assert!(facade.loss_data("no-such-model").await.is_empty());
    }

    #[tokio::test]
    async fn test_fine_tunes_expose_status() {
        let parts = components();
        let (registry, ..) = &parts;
        let facade = facade_of(&parts);

        let base = registry.register_base("qwen-coder-7b").await.unwrap();
        let v1 = registry.register_fine_tuned(&base.id, "flywheel-v1.0").await.unwrap();
        registry.register_fine_tuned(&v1.id, "flywheel-v1.1").await.unwrap();

        let rows = facade.fine_tunes().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].model_name, "flywheel-v1.1");
        assert_eq!(rows[0].status, ModelStatus::Active);
        assert_eq!(rows[1].status, ModelStatus::Archived);

        assert_eq!(facade.base_models().await.len(), 1);
    }

    #[tokio::test]
    async fn test_ab_tests_shape() {
        let parts = components();
        let (.., experiments) = &parts;
        let facade = facade_of(&parts);

        let set_id = SetId::new();
        let trial = Trial {
            id: TrialId::new(),
            name: "Button Test 1".to_string(),
            variants_label: "blue vs green".to_string(),
            variants: vec![
                Variant { name: "A".to_string(), conversions: 287, visitors: 2431 },
                Variant { name: "B".to_string(), conversions: 240, visitors: 2301 },
            ],
        };
        experiments
            .record_trial(&set_id, "Buy Button", "Button color tests", trial)
            .await
            .unwrap();

        let sets = facade.ab_tests().await;
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].total_tests, 1);
        assert_eq!(sets[0].tests[0].winner, "A");
        assert_eq!(sets[0].tests[0].improvement, "+13.2%");
        assert!(!sets[0].tests[0].flagged);
    }

    #[test]
    fn test_format_improvement() {
        assert_eq!(format_improvement(12.94, true), "+12.9%");
        assert_eq!(format_improvement(0.0, true), "0%");
        assert_eq!(format_improvement(42.0, false), "0%");
    }
}
