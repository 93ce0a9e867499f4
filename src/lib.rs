pub mod api;
pub mod core;

pub use api::VideoTextScanner;
pub use crate::core::ocr::{RecognizerFactory, TesseractConfig, TextRecognizer};
pub use crate::core::pipeline::{
    CancellationToken, ExecutionMode, Pipeline, ResultLedger, ScanConfig, ScanError,
    ScanObserver, ScanSummary,
};
pub use crate::core::video::{FfmpegFrameSource, Frame, FrameSource, SourceInfo};

/// 初始化日志 (env_logger)，`RUST_LOG` 优先于 `default_level`，重复调用无效
pub fn init_logging(default_level: &str) {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .try_init();
}
