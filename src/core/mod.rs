pub mod ocr;
pub mod pipeline;
pub mod video;
