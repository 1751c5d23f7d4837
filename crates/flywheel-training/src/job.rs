use chrono::{DateTime, Utc};
use flywheel_registry::ModelId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier for a training job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Training job execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Job accepted, trainer has not started yet.
    Queued,
    /// Trainer is producing progress and loss samples.
    Running,
    /// Training finished and the result model is registered.
    Succeeded,
    /// Training failed; `failure_reason` is recorded.
    Failed,
    /// Cancelled by request; the trainer is expected to stop pushing.
    Cancelled,
}

impl JobState {
    /// Whether this state is terminal. Terminal jobs are immutable.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Checks if the job can transition to the given state.
    #[must_use]
    pub fn can_transition_to(&self, to: Self) -> bool {
        match (self, to) {
            // From Queued: the trainer starts, or the job is abandoned
            (Self::Queued, Self::Running | Self::Failed | Self::Cancelled) => true,
            // From Running: only terminal states
            (Self::Running, Self::Succeeded | Self::Failed | Self::Cancelled) => true,
            // Terminal states never transition
            _ => false,
        }
    }
}

/// A fine-tuning job tracked by the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingJob {
    pub id: JobId,
    /// The base or parent model being tuned from.
    pub model_id: ModelId,
    /// Root of the model's lineage, resolved at submit time.
    pub lineage_root: ModelId,
    pub state: JobState,
    /// 0..=100, monotone non-decreasing while Running.
    pub progress: u8,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Set only when the job succeeded.
    pub result_model_id: Option<ModelId>,
    /// Set only when the job failed.
    pub failure_reason: Option<String>,
}

impl TrainingJob {
    pub(crate) fn new(model_id: ModelId, lineage_root: ModelId) -> Self {
        Self {
            id: JobId::new(),
            model_id,
            lineage_root,
            state: JobState::Queued,
            progress: 0,
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
            result_model_id: None,
            failure_reason: None,
        }
    }
}
