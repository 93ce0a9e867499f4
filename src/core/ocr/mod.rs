pub mod error;
pub mod recognizer;
pub mod tesseract;

pub use error::RecognitionError;
pub use recognizer::{
    normalize_text, MockRecognizerFactory, MockTextRecognizer, RecognizerFactory, TextRecognizer,
};
pub use tesseract::{TesseractConfig, TesseractFactory};
#[cfg(feature = "tesseract")]
pub use tesseract::TesseractRecognizer;
