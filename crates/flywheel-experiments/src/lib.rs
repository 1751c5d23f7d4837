//! Flywheel Experiments
//!
//! A/B experiment aggregation:
//! - Append-only trial ingestion per test set (`ExperimentAggregator`)
//! - Read-time winner/lift derivation (`TrialOutcome`)
//! - Per-set summaries ordered by most recent update
//!
//! Derived values are recomputed on every read and never cached, so later
//! corrections to trial data are always reflected.

pub mod aggregator;
pub mod error;
pub mod trial;

pub use aggregator::{ExperimentAggregator, ExperimentSet, SetSummary};
pub use error::{ExperimentError, ExperimentResult};
pub use trial::{SetId, Trial, TrialId, TrialOutcome, Variant};
