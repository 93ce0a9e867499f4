use crate::core::video::DecodeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("The text to find cannot be empty.")]
    EmptyQuery,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Source(#[from] DecodeError),
    #[error("Cannot write results: {0}")]
    Persistence(#[from] std::io::Error),
    #[error("Cannot start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}
