use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("video source '{path}' is unavailable: {reason}")]
    SourceUnavailable { path: PathBuf, reason: String },
    #[error("ffmpeg error: {0}")]
    Ffmpeg(String),
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}
