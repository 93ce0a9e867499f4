//! 帧处理流水线 - 抽帧、并行 OCR、按序落盘
//!
//! [`FrameSource`] 产出的帧经 [`FrameBuffer`] 分发给 OCR worker（每个 worker
//! 持有一个识别器），结果汇入 [`ResultLedger`]，按帧序号写出。

pub mod buffer;
pub mod config;
pub mod error;
pub mod ledger;
pub mod matcher;
pub mod observer;
pub mod progress;
pub mod result;
mod worker;

pub use buffer::{CloseOnDrop, FrameBuffer, Take};
pub use config::{
    clamp_stride, default_workers, CancellationToken, ExecutionMode, ScanConfig,
    DEFAULT_FLUSH_EVERY,
};
pub use error::ScanError;
pub use ledger::{LedgerStats, ResultLedger, OUTPUT_HEADER};
pub use matcher::SearchMatcher;
pub use observer::{NoopObserver, ScanObserver};
pub use progress::{
    estimate, format_clock, render_progress_line, Progress, ProgressSnapshot, ProgressTracker,
};
pub use result::{MatchRecord, RecognitionResult, ScanSummary};

use crate::core::ocr::RecognizerFactory;
use crate::core::video::{format_timestamp, Frame, FrameSource};
use log::{info, warn};
use std::time::Instant;
use worker::{FrameWorker, WorkerContext};

/// 已校验的扫描任务，对一个帧来源运行一次
pub struct Pipeline {
    config: ScanConfig,
    matcher: SearchMatcher,
}

impl Pipeline {
    pub fn new(config: ScanConfig) -> Result<Self, ScanError> {
        let matcher = config.validate()?;
        Ok(Self { config, matcher })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn run<S: FrameSource + ?Sized>(
        self,
        source: &mut S,
        factory: &dyn RecognizerFactory,
        ledger: ResultLedger,
        observer: &dyn ScanObserver,
    ) -> Result<ScanSummary, ScanError> {
        let info = source.info();
        observer.on_source_opened(&info);
        ledger.set_stride(info.stride);

        let started = Instant::now();
        let extraction = ProgressTracker::new(info.expected_frames());
        let processing = ProgressTracker::new(info.expected_frames());
        let workers = match self.config.mode {
            ExecutionMode::Sequential => 1,
            _ => self.config.workers,
        };
        info!(
            "🚀 Scanning for {:?}: mode {:?}, {} worker(s), flush every {} frames",
            self.matcher.query(),
            self.config.mode,
            workers,
            self.config.flush_every
        );

        let ctx = WorkerContext::new(&self.matcher, &ledger, &processing, observer);
        let extracted = match self.config.mode {
            ExecutionMode::Sequential => self.run_sequential(source, factory, &ctx, &extraction),
            ExecutionMode::Batched => {
                self.run_batched(source, factory, &ctx, &extraction, workers)?
            }
            ExecutionMode::Streaming => {
                self.run_streaming(source, factory, &ctx, &extraction, workers)?
            }
        };
        let (recognition_failures, matches) = ctx.into_parts();

        info!("💾 Finalizing output...");
        let stats = ledger.finish()?;
        let cancelled = self.config.cancel.is_cancelled();

        let summary = ScanSummary {
            query: self.matcher.query().to_string(),
            mode: self.config.mode,
            workers,
            frames_extracted: extracted,
            frames_processed: processing.completed(),
            frames_matched: self.matcher.matched_count(),
            recognition_failures,
            lines_written: stats.written,
            matches,
            elapsed: started.elapsed(),
            cancelled,
        };

        info!(
            "✅ Processing complete. Frames processed: {}, frames with text found: {}, elapsed: {}",
            summary.frames_processed,
            summary.frames_matched,
            format_clock(summary.elapsed)
        );
        if recognition_failures > 0 {
            warn!("⚠️ {} frames could not be recognised", recognition_failures);
        }
        Ok(summary)
    }

    fn run_sequential<S: FrameSource + ?Sized>(
        &self,
        source: &mut S,
        factory: &dyn RecognizerFactory,
        ctx: &WorkerContext<'_>,
        extraction: &ProgressTracker,
    ) -> u64 {
        let mut worker = FrameWorker::start(0, factory, ctx);
        let extracted = extract_frames(
            source,
            &self.config.cancel,
            extraction,
            ctx,
            |frame| worker.process(frame),
        );
        ctx.tracker().set_total(extracted);
        extracted
    }

    /// 先全部解码，再交给线程池识别
    fn run_batched<S: FrameSource + ?Sized>(
        &self,
        source: &mut S,
        factory: &dyn RecognizerFactory,
        ctx: &WorkerContext<'_>,
        extraction: &ProgressTracker,
        workers: usize,
    ) -> Result<u64, ScanError> {
        let buffer = FrameBuffer::new();
        let extracted = {
            let _close = CloseOnDrop(&buffer);
            extract_frames(source, &self.config.cancel, extraction, ctx, |frame| {
                buffer.put(frame)
            })
        };
        ctx.tracker().set_total(extracted);
        ctx.tracker().restart_clock();
        info!("📦 Extraction complete. Extracted {} frames.", extracted);

        let pool = build_pool(workers)?;
        let cancel = &self.config.cancel;
        pool.in_place_scope(|scope| {
            for id in 0..workers {
                let buffer = &buffer;
                scope.spawn(move |_| FrameWorker::start(id, factory, ctx).drain(buffer, cancel));
            }
        });

        discard_leftovers(&buffer);
        Ok(extracted)
    }

    /// 当前线程解码，线程池同时消费缓冲区
    fn run_streaming<S: FrameSource + ?Sized>(
        &self,
        source: &mut S,
        factory: &dyn RecognizerFactory,
        ctx: &WorkerContext<'_>,
        extraction: &ProgressTracker,
        workers: usize,
    ) -> Result<u64, ScanError> {
        let buffer = FrameBuffer::new();
        let pool = build_pool(workers)?;
        let cancel = &self.config.cancel;

        let extracted = pool.in_place_scope(|scope| {
            for id in 0..workers {
                let buffer = &buffer;
                scope.spawn(move |_| FrameWorker::start(id, factory, ctx).drain(buffer, cancel));
            }

            let _close = CloseOnDrop(&buffer);
            let extracted = extract_frames(source, cancel, extraction, ctx, |frame| {
                buffer.put(frame)
            });
            ctx.tracker().set_total(extracted);
            extracted
        });

        discard_leftovers(&buffer);
        Ok(extracted)
    }
}

/// 抽帧直到来源结束、解码失败或被取消
///
/// 解码失败视为流结束，已交给 `sink` 的帧保留。
fn extract_frames<S: FrameSource + ?Sized>(
    source: &mut S,
    cancel: &CancellationToken,
    tracker: &ProgressTracker,
    ctx: &WorkerContext<'_>,
    mut sink: impl FnMut(Frame),
) -> u64 {
    let observer = ctx.observer();
    let mut extracted = 0;
    loop {
        if cancel.is_cancelled() {
            info!("⏹️ Extraction cancelled after {} frames", extracted);
            break;
        }
        match source.next_frame() {
            Ok(Some(frame)) => {
                extracted += 1;
                sink(frame);
                observer.on_extracted(tracker.advance());
            }
            Ok(None) => break,
            Err(e) => {
                warn!(
                    "⚠️ Frame decode failed after {} frames, stopping extraction: {}",
                    extracted, e
                );
                break;
            }
        }
    }
    observer.on_extraction_finished(extracted);
    extracted
}

fn build_pool(workers: usize) -> Result<rayon::ThreadPool, ScanError> {
    Ok(rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("ocr-worker-{}", i))
        .build()?)
}

fn discard_leftovers(buffer: &FrameBuffer) {
    let discarded = buffer.clear();
    if discarded > 0 {
        info!("⏹️ Discarded {} unprocessed frames after cancellation", discarded);
    }
}

/// 命中提示文本
pub fn describe_match(result: &RecognitionResult) -> String {
    format!(
        "Text found in frame {} at timestamp {}",
        result.frame_index,
        format_timestamp(result.timestamp)
    )
}
