use thiserror::Error;

pub type ExperimentResult<T> = std::result::Result<T, ExperimentError>;

#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error("experiment set not found: {0}")]
    NotFound(String),

    #[error("invalid trial: {0}")]
    Validation(String),
}
