//! Append-only per-epoch loss capture.
//!
//! One ordered, gap-free sample sequence per job. Samples are validated
//! against the owning job's state under the job lock, so a concurrent
//! terminal transition cannot interleave with an append.

use crate::error::{TrainingError, TrainingResult};
use crate::job::JobId;
use crate::scheduler::JobScheduler;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// One recorded loss value at a training epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossSample {
    pub epoch: u32,
    pub loss: f64,
}

/// Recorder for per-job loss series.
pub struct MetricRecorder {
    scheduler: Arc<JobScheduler>,
    /// Map of job ID to its sample sequence.
    series: RwLock<HashMap<JobId, Arc<Mutex<Vec<LossSample>>>>>,
}

impl fmt::Debug for MetricRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricRecorder")
            .field("series_count", &self.series.try_read().map(|s| s.len()).unwrap_or(0))
            .finish_non_exhaustive()
    }
}

impl MetricRecorder {
    /// Creates a recorder bound to the scheduler that owns the jobs.
    #[must_use]
    pub fn new(scheduler: Arc<JobScheduler>) -> Self {
        Self { scheduler, series: RwLock::new(HashMap::new()) }
    }

    /// Appends a loss sample for a job.
    ///
    /// # Errors
    /// Returns `UnknownJob` if the job does not exist or is already terminal,
    /// `InvalidLoss` for a negative or non-finite loss, and `OutOfOrderEpoch`
    /// unless the epoch is exactly one past the last recorded epoch (the
    /// first epoch is 1).
    pub async fn append_sample(&self, job_id: &JobId, epoch: u32, loss: f64) -> TrainingResult<()> {
        let handle = self.scheduler.job_handle(job_id).await?;
        let job = handle.lock().await;
        if job.state.is_terminal() {
            return Err(TrainingError::UnknownJob(job_id.to_string()));
        }
        if !loss.is_finite() || loss < 0.0 {
            return Err(TrainingError::InvalidLoss(loss));
        }

        let series_handle = self.series_handle(job_id).await;
        let mut series = series_handle.lock().await;
        let expected = series.last().map_or(1, |s| s.epoch + 1);
        if epoch != expected {
            return Err(TrainingError::OutOfOrderEpoch { expected, got: epoch });
        }

        series.push(LossSample { epoch, loss });
        debug!(job_id = %job_id, epoch, loss, "Recorded loss sample");
        Ok(())
    }

    /// Returns the ordered loss series for a job.
    ///
    /// Jobs (or ids) with no samples yield an empty series; unknown ids are
    /// a read-side non-event, not an error.
    pub async fn get_series(&self, job_id: &JobId) -> Vec<LossSample> {
        let series = self.series.read().await;
        match series.get(job_id) {
            Some(handle) => handle.lock().await.clone(),
            None => Vec::new(),
        }
    }

    async fn series_handle(&self, job_id: &JobId) -> Arc<Mutex<Vec<LossSample>>> {
        if let Some(handle) = self.series.read().await.get(job_id) {
            return handle.clone();
        }
        let mut series = self.series.write().await;
        series.entry(job_id.clone()).or_default().clone()
    }
}
