use super::config::ExecutionMode;
use crate::core::video::format_timestamp;
use serde::{Serialize, Serializer};
use std::time::Duration;

/// 单帧识别结果
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionResult {
    pub frame_index: u64,
    pub timestamp: Duration,
    /// 已归一化为单行
    pub text: String,
    pub matched: bool,
}

impl RecognitionResult {
    /// `index \t hh:mm:ss.fff \t text`
    pub fn to_tsv_line(&self) -> String {
        format!(
            "{}\t{}\t{}",
            self.frame_index,
            format_timestamp(self.timestamp),
            self.text
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchRecord {
    pub frame_index: u64,
    pub timestamp: String,
    pub text: String,
}

impl From<&RecognitionResult> for MatchRecord {
    fn from(result: &RecognitionResult) -> Self {
        Self {
            frame_index: result.frame_index,
            timestamp: format_timestamp(result.timestamp),
            text: result.text.clone(),
        }
    }
}

/// 扫描汇总
#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub query: String,
    pub mode: ExecutionMode,
    pub workers: usize,
    pub frames_extracted: u64,
    pub frames_processed: u64,
    pub frames_matched: u64,
    pub recognition_failures: u64,
    pub lines_written: u64,
    pub matches: Vec<MatchRecord>,
    #[serde(rename = "elapsed_seconds", serialize_with = "as_seconds")]
    pub elapsed: Duration,
    pub cancelled: bool,
}

fn as_seconds<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}
