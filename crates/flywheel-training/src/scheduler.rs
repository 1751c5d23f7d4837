//! Training job scheduler.
//!
//! Owns the job state machine and the single-active-job-per-lineage
//! invariant. Submission check-and-insert happens while holding the lineage
//! slot lock, so two concurrent submits for one lineage cannot both pass the
//! check. The lock order is always lineage slot, then job.

use crate::error::{TrainingError, TrainingResult};
use crate::job::{JobId, JobState, TrainingJob};
use chrono::Utc;
use flywheel_registry::{Model, ModelId, ModelRegistry};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Per-lineage scheduling slot. Holds the one Queued/Running job, if any.
#[derive(Debug, Default)]
struct LineageSlot {
    active: Option<JobId>,
}

/// Scheduler for fine-tuning jobs.
pub struct JobScheduler {
    registry: Arc<ModelRegistry>,
    /// Map of job ID to job handle; per-job mutation is serialized by the
    /// inner mutex, independent jobs never block each other.
    jobs: RwLock<HashMap<JobId, Arc<Mutex<TrainingJob>>>>,
    /// Map of lineage root to its scheduling slot.
    lineages: RwLock<HashMap<ModelId, Arc<Mutex<LineageSlot>>>>,
    /// Index from result model to the job that produced it.
    results: RwLock<HashMap<ModelId, JobId>>,
}

impl fmt::Debug for JobScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobScheduler")
            .field("job_count", &self.jobs.try_read().map(|j| j.len()).unwrap_or(0))
            .finish_non_exhaustive()
    }
}

impl JobScheduler {
    /// Creates a scheduler backed by the given model registry.
    #[must_use]
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self {
            registry,
            jobs: RwLock::new(HashMap::new()),
            lineages: RwLock::new(HashMap::new()),
            results: RwLock::new(HashMap::new()),
        }
    }

    /// Submits a fine-tuning job for a base or parent model.
    ///
    /// # Errors
    /// Returns `Registry(NotFound)` for an unknown model, or `Conflict` if
    /// the model's lineage already has a Queued or Running job.
    pub async fn submit(&self, model_id: &ModelId) -> TrainingResult<TrainingJob> {
        // Resolving the root also validates the model exists.
        let root = self.registry.lineage_root(model_id).await?;

        let slot_handle = self.slot(&root).await;
        let mut slot = slot_handle.lock().await;

        if let Some(active) = &slot.active {
            warn!(lineage_root = %root, job_id = %active, "Lineage already has an active job");
            return Err(TrainingError::Conflict {
                lineage_root: root.to_string(),
                job_id: active.to_string(),
            });
        }

        let job = TrainingJob::new(model_id.clone(), root.clone());
        info!(job_id = %job.id, model_id = %model_id, lineage_root = %root, "Submitted job");

        self.jobs.write().await.insert(job.id.clone(), Arc::new(Mutex::new(job.clone())));
        slot.active = Some(job.id.clone());
        Ok(job)
    }

    /// Marks a job as started by the trainer (Queued -> Running).
    pub async fn start(&self, job_id: &JobId) -> TrainingResult<()> {
        let handle = self.job_handle(job_id).await?;
        let mut job = handle.lock().await;

        if job.state != JobState::Queued {
            return Err(invalid_transition(&job, "start"));
        }
        job.state = JobState::Running;
        job.started_at = Some(Utc::now());
        debug!(job_id = %job_id, "Job started");
        Ok(())
    }

    /// Records a progress report from the trainer.
    ///
    /// Valid only while Running. Progress is monotone non-decreasing and
    /// capped at 100; reaching 100 does not terminate the job, completion is
    /// a separate explicit call.
    pub async fn report_progress(&self, job_id: &JobId, progress: u8) -> TrainingResult<()> {
        let handle = self.job_handle(job_id).await?;
        let mut job = handle.lock().await;

        if job.state != JobState::Running {
            return Err(invalid_transition(&job, "report progress for"));
        }
        if progress > 100 || progress < job.progress {
            return Err(TrainingError::InvalidProgress {
                current: job.progress,
                requested: progress,
            });
        }
        job.progress = progress;
        debug!(job_id = %job_id, progress, "Progress reported");
        Ok(())
    }

    /// Completes a Running job, registering the result model.
    ///
    /// Registration happens before the state transition; if the registry
    /// rejects the name the job stays Running and can be completed again.
    pub async fn complete(&self, job_id: &JobId, final_model_name: &str) -> TrainingResult<Model> {
        let handle = self.job_handle(job_id).await?;
        let root = handle.lock().await.lineage_root.clone();
        let slot_handle = self.slot(&root).await;
        let mut slot = slot_handle.lock().await;
        let mut job = handle.lock().await;

        if job.state != JobState::Running {
            return Err(invalid_transition(&job, "complete"));
        }

        let model = self.registry.register_fine_tuned(&job.model_id, final_model_name).await?;

        job.state = JobState::Succeeded;
        job.result_model_id = Some(model.id.clone());
        job.finished_at = Some(Utc::now());
        Self::release(&mut slot, &job.id);
        self.results.write().await.insert(model.id.clone(), job.id.clone());

        info!(job_id = %job_id, model_id = %model.id, model = %model.name, "Job succeeded");
        Ok(model)
    }

    /// Fails a Queued or Running job, recording the reason.
    pub async fn fail(&self, job_id: &JobId, reason: &str) -> TrainingResult<()> {
        self.terminate(job_id, JobState::Failed, Some(reason)).await
    }

    /// Cancels a Queued or Running job.
    ///
    /// Cancellation is cooperative: this only flips the recorded state, and
    /// any late progress or loss push is rejected rather than accepted.
    pub async fn cancel(&self, job_id: &JobId) -> TrainingResult<()> {
        self.terminate(job_id, JobState::Cancelled, None).await
    }

    /// Returns a snapshot of a job.
    pub async fn get(&self, job_id: &JobId) -> TrainingResult<TrainingJob> {
        let handle = self.job_handle(job_id).await?;
        let job = handle.lock().await;
        Ok(job.clone())
    }

    /// Looks up the job that produced a fine-tuned model.
    pub async fn job_for_model(&self, model_id: &ModelId) -> Option<JobId> {
        self.results.read().await.get(model_id).cloned()
    }

    async fn terminate(
        &self,
        job_id: &JobId,
        to: JobState,
        reason: Option<&str>,
    ) -> TrainingResult<()> {
        let handle = self.job_handle(job_id).await?;
        let root = handle.lock().await.lineage_root.clone();
        let slot_handle = self.slot(&root).await;
        let mut slot = slot_handle.lock().await;
        let mut job = handle.lock().await;

        if !job.state.can_transition_to(to) {
            return Err(invalid_transition(
                &job,
                if to == JobState::Failed { "fail" } else { "cancel" },
            ));
        }

        info!(job_id = %job_id, from = ?job.state, to = ?to, "Job terminated");
        job.state = to;
        job.failure_reason = reason.map(ToString::to_string);
        job.finished_at = Some(Utc::now());
        Self::release(&mut slot, &job.id);
        Ok(())
    }

    fn release(slot: &mut LineageSlot, job_id: &JobId) {
        if slot.active.as_ref() == Some(job_id) {
            slot.active = None;
        }
    }

    pub(crate) async fn job_handle(&self, job_id: &JobId) -> TrainingResult<Arc<Mutex<TrainingJob>>> {
        let jobs = self.jobs.read().await;
        jobs.get(job_id).cloned().ok_or_else(|| TrainingError::UnknownJob(job_id.to_string()))
    }

    async fn slot(&self, root: &ModelId) -> Arc<Mutex<LineageSlot>> {
        if let Some(slot) = self.lineages.read().await.get(root) {
            return slot.clone();
        }
        let mut lineages = self.lineages.write().await;
        lineages.entry(root.clone()).or_default().clone()
    }
}

fn invalid_transition(job: &TrainingJob, action: &'static str) -> TrainingError {
    TrainingError::InvalidTransition { job_id: job.id.to_string(), from: job.state, action }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> (Arc<ModelRegistry>, JobScheduler, Model) {
        let registry = Arc::new(ModelRegistry::new());
        let base = registry.register_base("qwen-coder-7b").await.unwrap();
        let scheduler = JobScheduler::new(registry.clone());
        (registry, scheduler, base)
    }

    #[tokio::test]
    async fn test_submit_unknown_model() {
        let (_registry, scheduler, _base) = setup().await;
        let err = scheduler.submit(&ModelId::new()).await.unwrap_err();
        assert!(matches!(err, TrainingError::Registry(_)));
    }

    #[tokio::test]
    async fn test_second_submit_conflicts_until_terminal() {
        let (_registry, scheduler, base) = setup().await;

        let job = scheduler.submit(&base.id).await.unwrap();
        let err = scheduler.submit(&base.id).await.unwrap_err();
        assert!(matches!(err, TrainingError::Conflict { .. }));

        scheduler.fail(&job.id, "trainer crashed").await.unwrap();
        let retry = scheduler.submit(&base.id).await.unwrap();
        assert_ne!(retry.id, job.id);
    }

    #[tokio::test]
    async fn test_conflict_covers_the_whole_lineage() {
        let (registry, scheduler, base) = setup().await;
        let v1 = registry.register_fine_tuned(&base.id, "flywheel-v1.0").await.unwrap();

        // Tuning from the base and tuning from v1 contend for the same slot.
        scheduler.submit(&base.id).await.unwrap();
        let err = scheduler.submit(&v1.id).await.unwrap_err();
        assert!(matches!(err, TrainingError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_independent_lineages_do_not_conflict() {
        let (registry, scheduler, base) = setup().await;
        let other = registry.register_base("gpt-oss-20b").await.unwrap();

        scheduler.submit(&base.id).await.unwrap();
        scheduler.submit(&other.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_progress_is_monotone_and_bounded() {
        let (_registry, scheduler, base) = setup().await;
        let job = scheduler.submit(&base.id).await.unwrap();

        // Not valid before the trainer starts.
        let err = scheduler.report_progress(&job.id, 10).await.unwrap_err();
        assert!(matches!(err, TrainingError::InvalidTransition { .. }));

        scheduler.start(&job.id).await.unwrap();
        scheduler.report_progress(&job.id, 10).await.unwrap();
        scheduler.report_progress(&job.id, 10).await.unwrap();
        scheduler.report_progress(&job.id, 55).await.unwrap();

        let err = scheduler.report_progress(&job.id, 54).await.unwrap_err();
        assert!(matches!(err, TrainingError::InvalidProgress { current: 55, requested: 54 }));

        scheduler.report_progress(&job.id, 100).await.unwrap();
        // Reaching 100 does not terminate the job.
        assert_eq!(scheduler.get(&job.id).await.unwrap().state, JobState::Running);
    }

    #[tokio::test]
    async fn test_complete_registers_active_model() {
        let (registry, scheduler, base) = setup().await;
        let job = scheduler.submit(&base.id).await.unwrap();
        scheduler.start(&job.id).await.unwrap();

        let model = scheduler.complete(&job.id, "flywheel-v1.0").await.unwrap();
        assert!(model.is_active());

        let job = scheduler.get(&job.id).await.unwrap();
        assert_eq!(job.state, JobState::Succeeded);
        assert_eq!(job.result_model_id, Some(model.id.clone()));
        assert!(job.finished_at.is_some());

        let active = registry.active_of_lineage(&base.id).await.unwrap();
        assert_eq!(active.map(|m| m.id), Some(model.id.clone()));
        assert_eq!(scheduler.job_for_model(&model.id).await, Some(job.id));
    }

    #[tokio::test]
    async fn test_complete_requires_running() {
        let (_registry, scheduler, base) = setup().await;
        let job = scheduler.submit(&base.id).await.unwrap();

        let err = scheduler.complete(&job.id, "flywheel-v1.0").await.unwrap_err();
        assert!(matches!(err, TrainingError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_result_name_leaves_job_running() {
        let (registry, scheduler, base) = setup().await;
        registry.register_fine_tuned(&base.id, "flywheel-v1.0").await.unwrap();

        // That registration freed no slot, so a fresh job can still run.
        let job = scheduler.submit(&base.id).await.unwrap();
        scheduler.start(&job.id).await.unwrap();

        let err = scheduler.complete(&job.id, "flywheel-v1.0").await.unwrap_err();
        assert!(matches!(err, TrainingError::Registry(_)));
        assert_eq!(scheduler.get(&job.id).await.unwrap().state, JobState::Running);

        scheduler.complete(&job.id, "flywheel-v1.1").await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_rejects_late_updates() {
        let (_registry, scheduler, base) = setup().await;
        let job = scheduler.submit(&base.id).await.unwrap();
        scheduler.start(&job.id).await.unwrap();
        scheduler.cancel(&job.id).await.unwrap();

        let err = scheduler.report_progress(&job.id, 50).await.unwrap_err();
        assert!(matches!(err, TrainingError::InvalidTransition { .. }));

        let err = scheduler.cancel(&job.id).await.unwrap_err();
        assert!(matches!(err, TrainingError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_fail_records_reason_and_frees_slot() {
        let (_registry, scheduler, base) = setup().await;
        let job = scheduler.submit(&base.id).await.unwrap();
        scheduler.fail(&job.id, "dataset missing").await.unwrap();

        let job = scheduler.get(&job.id).await.unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.failure_reason.as_deref(), Some("dataset missing"));

        scheduler.submit(&base.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_submits_admit_exactly_one() {
        let (_registry, scheduler, base) = setup().await;
        let scheduler = Arc::new(scheduler);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let scheduler = scheduler.clone();
            let model_id = base.id.clone();
            handles.push(tokio::spawn(async move { scheduler.submit(&model_id).await }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
    }
}
