//! Flywheel Training
//!
//! The fine-tuning control plane:
//! - The training job state machine (`JobScheduler`, `JobState`)
//! - Single-active-job-per-lineage scheduling
//! - Per-epoch loss capture (`MetricRecorder`)
//!
//! The trainer itself is an external collaborator; it pushes progress and
//! loss samples in, and this crate only validates and records them.

pub mod error;
pub mod job;
pub mod metrics;
pub mod scheduler;

pub use error::{TrainingError, TrainingResult};
pub use job::{JobId, JobState, TrainingJob};
pub use metrics::{LossSample, MetricRecorder};
pub use scheduler::JobScheduler;
