use super::progress::ProgressSnapshot;
use super::result::RecognitionResult;
use crate::core::video::SourceInfo;

/// 扫描过程回调（只读），会在 worker 线程中调用
pub trait ScanObserver: Sync {
    fn on_source_opened(&self, _info: &SourceInfo) {}

    fn on_extracted(&self, _progress: ProgressSnapshot) {}

    fn on_extraction_finished(&self, _extracted: u64) {}

    fn on_processed(&self, _progress: ProgressSnapshot) {}

    fn on_match(&self, _result: &RecognitionResult) {}
}

pub struct NoopObserver;

impl ScanObserver for NoopObserver {}
