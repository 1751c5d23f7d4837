//! Shared application state for the HTTP server.

use crate::facade::QueryFacade;
use flywheel_experiments::ExperimentAggregator;
use flywheel_registry::ModelRegistry;
use flywheel_training::{JobScheduler, MetricRecorder};
use std::sync::Arc;

/// The wired component graph behind the HTTP boundary.
#[derive(Debug)]
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    pub scheduler: Arc<JobScheduler>,
    pub recorder: Arc<MetricRecorder>,
    pub experiments: Arc<ExperimentAggregator>,
    pub facade: QueryFacade,
}

impl AppState {
    /// Builds a fresh component graph.
    #[must_use]
    pub fn new() -> Self {
        let registry = Arc::new(ModelRegistry::new());
        let scheduler = Arc::new(JobScheduler::new(registry.clone()));
        let recorder = Arc::new(MetricRecorder::new(scheduler.clone()));
        let experiments = Arc::new(ExperimentAggregator::new());
        let facade = QueryFacade::new(
            registry.clone(),
            scheduler.clone(),
            recorder.clone(),
            experiments.clone(),
        );
        Self { registry, scheduler, recorder, experiments, facade }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
