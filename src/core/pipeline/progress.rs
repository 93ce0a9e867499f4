//! 进度统计与估算

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

const BAR_WIDTH: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub percentage: f64,
    /// 至少完成一个单位后才有估算
    pub estimated_remaining: Option<Duration>,
}

/// 按已完成比例线性外推剩余时间
pub fn estimate(completed: u64, total: u64, elapsed: Duration) -> Progress {
    if completed == 0 || total == 0 {
        return Progress {
            percentage: 0.0,
            estimated_remaining: None,
        };
    }

    // Inaccurate container counts can push completed past total
    let fraction = (completed as f64 / total as f64).min(1.0);
    let estimated_total = elapsed.as_secs_f64() / fraction;
    let remaining = (estimated_total - elapsed.as_secs_f64()).max(0.0);

    Progress {
        percentage: fraction * 100.0,
        estimated_remaining: Some(Duration::from_secs_f64(remaining)),
    }
}

/// `[####------] 40.00% | Elapsed: 00:00:01 | Remaining: 00:00:02`
pub fn render_progress_line(completed: u64, total: u64, elapsed: Duration) -> String {
    let progress = estimate(completed, total, elapsed);
    let filled = ((progress.percentage / 100.0) * BAR_WIDTH as f64) as usize;
    let remaining = progress
        .estimated_remaining
        .map(format_clock)
        .unwrap_or_else(|| "--:--:--".to_string());

    format!(
        "[{}{}] {:.2}% | Elapsed: {} | Remaining: {}",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        progress.percentage,
        format_clock(elapsed),
        remaining
    )
}

/// 格式化为 `hh:mm:ss`，四舍五入到秒
pub fn format_clock(duration: Duration) -> String {
    let secs = duration.as_secs_f64().round() as u64;
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub completed: u64,
    pub total: u64,
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    pub fn progress(&self) -> Progress {
        estimate(self.completed, self.total, self.elapsed)
    }

    pub fn render(&self) -> String {
        render_progress_line(self.completed, self.total, self.elapsed)
    }
}

/// 单个阶段的进度计数器（抽帧、OCR 各一个）
#[derive(Debug)]
pub struct ProgressTracker {
    started: Mutex<Instant>,
    total: AtomicU64,
    completed: AtomicU64,
}

impl ProgressTracker {
    pub fn new(total: u64) -> Self {
        Self {
            started: Mutex::new(Instant::now()),
            total: AtomicU64::new(total),
            completed: AtomicU64::new(0),
        }
    }

    /// 抽帧结束后用真实帧数替换估算总数
    pub fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::SeqCst);
    }

    /// 阶段真正开始时重新计时
    pub fn restart_clock(&self) {
        *self.started.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    pub fn advance(&self) -> ProgressSnapshot {
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        ProgressSnapshot {
            completed,
            total: self.total.load(Ordering::SeqCst),
            elapsed: self.elapsed(),
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            completed: self.completed(),
            total: self.total.load(Ordering::SeqCst),
            elapsed: self.elapsed(),
        }
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn elapsed(&self) -> Duration {
        self.started
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }
}
