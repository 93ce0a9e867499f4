use super::error::ScanError;
use super::matcher::SearchMatcher;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const DEFAULT_FLUSH_EVERY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// 单线程，解码一帧识别一帧
    Sequential,
    /// 先解码全部帧，再由线程池识别
    Batched,
    /// 当前线程解码，同时线程池消费缓冲区
    Streaming,
}

/// 共享的取消标志，每帧检查一次
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub query: String,
    pub stride: u64,
    pub workers: usize,
    pub flush_every: usize,
    pub mode: ExecutionMode,
    pub cancel: CancellationToken,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            query: String::new(),
            stride: 1,
            workers: default_workers(),
            flush_every: DEFAULT_FLUSH_EVERY,
            mode: ExecutionMode::Streaming,
            cancel: CancellationToken::new(),
        }
    }
}

impl ScanConfig {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn sequential(query: impl Into<String>) -> Self {
        Self::new(query).with_mode(ExecutionMode::Sequential)
    }

    pub fn with_stride(mut self, stride: u64) -> Self {
        self.stride = stride.max(1);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_flush_every(mut self, flush_every: usize) -> Self {
        self.flush_every = flush_every.max(1);
        self
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// 构建匹配器；空查询在打开任何资源前被拒绝
    pub fn validate(&self) -> Result<SearchMatcher, ScanError> {
        if self.workers == 0 {
            return Err(ScanError::InvalidConfig("worker count must be at least 1".into()));
        }
        if self.flush_every == 0 {
            return Err(ScanError::InvalidConfig(
                "flush interval must be at least 1 frame".into(),
            ));
        }
        SearchMatcher::new(&self.query)
    }
}

/// CPU 核数减一，至少为 1
pub fn default_workers() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

/// 用户输入的跳帧参数，小于 1 视为不跳帧
pub fn clamp_stride(skip_frames: i64) -> u64 {
    skip_frames.max(1) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScanConfig::new("hello");
        assert_eq!(config.stride, 1);
        assert_eq!(config.flush_every, 10);
        assert_eq!(config.mode, ExecutionMode::Streaming);
        assert!(config.workers >= 1);
        assert!(!config.cancel.is_cancelled());
    }

    #[test]
    fn test_builders_clamp() {
        let config = ScanConfig::new("x")
            .with_stride(0)
            .with_workers(0)
            .with_flush_every(0);
        assert_eq!(config.stride, 1);
        assert_eq!(config.workers, 1);
        assert_eq!(config.flush_every, 1);
    }

    #[test]
    fn test_clamp_stride() {
        assert_eq!(clamp_stride(0), 1);
        assert_eq!(clamp_stride(-4), 1);
        assert_eq!(clamp_stride(1), 1);
        assert_eq!(clamp_stride(5), 5);
    }

    #[test]
    fn test_validate_rejects_empty_query() {
        assert!(matches!(
            ScanConfig::new("").validate(),
            Err(ScanError::EmptyQuery)
        ));
        assert!(matches!(
            ScanConfig::new("\"\"").validate(),
            Err(ScanError::EmptyQuery)
        ));
        assert!(ScanConfig::new("ok").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_workers_set_directly() {
        let mut config = ScanConfig::new("ok");
        config.workers = 0;
        assert!(matches!(
            config.validate(),
            Err(ScanError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_cancellation_token_is_shared() {
        let token = CancellationToken::new();
        let config = ScanConfig::new("x").with_cancellation(token.clone());
        token.cancel();
        assert!(config.cancel.is_cancelled());
    }
}
