pub mod error;
pub mod ffmpeg;
pub mod frame;
pub mod source;

pub use error::DecodeError;
pub use ffmpeg::FfmpegFrameSource;
pub use frame::{format_timestamp, timestamp_for, Frame};
pub use source::{FrameSource, SourceInfo, SyntheticFrameSource};
