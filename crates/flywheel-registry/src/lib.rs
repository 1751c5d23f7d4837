//! Flywheel Model Registry
//!
//! Stores base models and fine-tuned model versions, their lineage, and
//! active/archived status:
//! - Registering models (`ModelRegistry`)
//! - Parent-pointer lineage resolution (`lineage_root`)
//! - The one-Active-model-per-lineage invariant

pub mod error;
pub mod model;
pub mod registry;

pub use error::{RegistryError, RegistryResult};
pub use model::{Model, ModelId, ModelKind, ModelStatus};
pub use registry::ModelRegistry;
