use thiserror::Error;

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("model not found: {0}")]
    NotFound(String),

    #[error("model name already registered: {0}")]
    DuplicateName(String),

    /// Two Active models detected in one lineage. This is a locking bug,
    /// not a bad request, and callers must surface it distinctly.
    #[error("lineage invariant breach: {0}")]
    LineageBreach(String),
}
