use crate::job::JobState;
use flywheel_registry::RegistryError;
use thiserror::Error;

pub type TrainingResult<T> = std::result::Result<T, TrainingError>;

#[derive(Debug, Error)]
pub enum TrainingError {
    /// The job does not exist, or is terminal and no longer accepts updates.
    #[error("unknown job: {0}")]
    UnknownJob(String),

    /// Another job for the same lineage is already Queued or Running.
    #[error("lineage {lineage_root} already has an active job {job_id}")]
    Conflict { lineage_root: String, job_id: String },

    /// The operation is not valid from the job's current state.
    #[error("cannot {action} job {job_id} from state {from:?}")]
    InvalidTransition { job_id: String, from: JobState, action: &'static str },

    /// Progress must stay within 0..=100 and never decrease.
    #[error("invalid progress: current {current}, requested {requested}")]
    InvalidProgress { current: u8, requested: u8 },

    /// Loss epochs form a gap-free strictly increasing sequence per job.
    #[error("out of order epoch: expected {expected}, got {got}")]
    OutOfOrderEpoch { expected: u32, got: u32 },

    /// Loss samples must be finite and non-negative.
    #[error("invalid loss value: {0}")]
    InvalidLoss(f64),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
