use super::error::ScanError;
use std::sync::atomic::{AtomicU64, Ordering};

/// 忽略大小写的子串匹配，并统计命中帧数
#[derive(Debug)]
pub struct SearchMatcher {
    query: String,
    folded: String,
    matched: AtomicU64,
}

impl SearchMatcher {
    /// 去掉两端引号，剩余部分不能为空
    pub fn new(query: &str) -> Result<Self, ScanError> {
        let query = query.trim_matches('"');
        if query.is_empty() {
            return Err(ScanError::EmptyQuery);
        }
        Ok(Self {
            query: query.to_string(),
            folded: query.to_lowercase(),
            matched: AtomicU64::new(0),
        })
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn matches(&self, text: &str) -> bool {
        text.to_lowercase().contains(&self.folded)
    }

    /// 同 [`matches`](Self::matches)，命中时计数
    pub fn check(&self, text: &str) -> bool {
        let matched = self.matches(text);
        if matched {
            self.matched.fetch_add(1, Ordering::Relaxed);
        }
        matched
    }

    pub fn matched_count(&self) -> u64 {
        self.matched.load(Ordering::Relaxed)
    }
}
