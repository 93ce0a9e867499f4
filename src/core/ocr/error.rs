use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image encode error: {0}")]
    Encode(#[from] image::ImageError),
    #[error("OCR engine unavailable: {0}")]
    EngineUnavailable(String),
    #[error("OCR engine failed: {0}")]
    EngineFailed(String),
}
