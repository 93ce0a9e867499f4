use super::buffer::FrameBuffer;
use super::config::CancellationToken;
use super::ledger::ResultLedger;
use super::matcher::SearchMatcher;
use super::observer::ScanObserver;
use super::progress::ProgressTracker;
use super::result::{MatchRecord, RecognitionResult};
use crate::core::ocr::{normalize_text, RecognitionError, RecognizerFactory, TextRecognizer};
use crate::core::video::{format_timestamp, Frame};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// 一次运行中所有 worker 共享的状态
pub(crate) struct WorkerContext<'a> {
    matcher: &'a SearchMatcher,
    ledger: &'a ResultLedger,
    tracker: &'a ProgressTracker,
    observer: &'a dyn ScanObserver,
    failures: AtomicU64,
    matches: Mutex<Vec<MatchRecord>>,
}

impl<'a> WorkerContext<'a> {
    pub fn new(
        matcher: &'a SearchMatcher,
        ledger: &'a ResultLedger,
        tracker: &'a ProgressTracker,
        observer: &'a dyn ScanObserver,
    ) -> Self {
        Self {
            matcher,
            ledger,
            tracker,
            observer,
            failures: AtomicU64::new(0),
            matches: Mutex::new(Vec::new()),
        }
    }

    pub fn tracker(&self) -> &ProgressTracker {
        self.tracker
    }

    pub fn observer(&self) -> &'a dyn ScanObserver {
        self.observer
    }

    /// 识别失败数，以及按帧序号排序的命中结果
    pub fn into_parts(self) -> (u64, Vec<MatchRecord>) {
        let mut matches = self
            .matches
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        matches.sort_by_key(|m| m.frame_index);
        (self.failures.into_inner(), matches)
    }
}

/// OCR worker，整个运行期间持有自己的识别器
pub(crate) struct FrameWorker<'a> {
    id: usize,
    recognizer: Option<Box<dyn TextRecognizer>>,
    ctx: &'a WorkerContext<'a>,
    processed: u64,
}

impl<'a> FrameWorker<'a> {
    /// 只初始化一次识别器；初始化失败时仍为每帧记录空结果
    pub fn start(id: usize, factory: &dyn RecognizerFactory, ctx: &'a WorkerContext<'a>) -> Self {
        let recognizer = match factory.create() {
            Ok(recognizer) => {
                debug!("🔧 Worker {}: recognizer ready", id);
                Some(recognizer)
            }
            Err(e) => {
                warn!("⚠️ Worker {}: recognizer unavailable, frames will have no text: {}", id, e);
                None
            }
        };
        Self {
            id,
            recognizer,
            ctx,
            processed: 0,
        }
    }

    fn recognize(&mut self, frame: &Frame) -> Result<String, RecognitionError> {
        let recognizer = self.recognizer.as_mut().ok_or_else(|| {
            RecognitionError::EngineUnavailable("recognizer failed to initialise".to_string())
        })?;
        let gray = frame.to_grayscale();
        recognizer.recognize(&gray)
    }

    pub fn process(&mut self, frame: Frame) {
        let text = match self.recognize(&frame) {
            Ok(raw) => normalize_text(&raw),
            Err(e) => {
                if self.recognizer.is_some() {
                    warn!("⚠️ Worker {}: OCR failed on frame {}: {}", self.id, frame.index, e);
                } else {
                    debug!("Worker {}: no recognizer for frame {}", self.id, frame.index);
                }
                self.ctx.failures.fetch_add(1, Ordering::Relaxed);
                String::new()
            }
        };

        let matched = self.ctx.matcher.check(&text);
        let result = RecognitionResult {
            frame_index: frame.index,
            timestamp: frame.timestamp,
            text,
            matched,
        };
        drop(frame);

        if matched {
            info!(
                "🔎 Text found in frame {} at timestamp {}",
                result.frame_index,
                format_timestamp(result.timestamp)
            );
            self.ctx
                .matches
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(MatchRecord::from(&result));
            self.ctx.observer.on_match(&result);
        }

        if let Err(e) = self.ctx.ledger.record(result) {
            warn!("⚠️ Periodic flush failed, results kept for the next flush: {}", e);
        }

        self.processed += 1;
        self.ctx.observer.on_processed(self.ctx.tracker.advance());
    }

    /// 持续取帧，直到缓冲区关闭且为空，或运行被取消
    pub fn drain(&mut self, buffer: &FrameBuffer, cancel: &CancellationToken) {
        while !cancel.is_cancelled() {
            match buffer.take() {
                Some(frame) => self.process(frame),
                None => break,
            }
        }
    }
}

impl Drop for FrameWorker<'_> {
    fn drop(&mut self) {
        debug!("🗑️ Worker {}: done after {} frames", self.id, self.processed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ocr::{MockRecognizerFactory, MockTextRecognizer};
    use crate::core::pipeline::observer::NoopObserver;
    use image::{Rgb, RgbImage};

    fn shaded_frame(index: u64) -> Frame {
        let shade = index as u8;
        Frame::new(index, RgbImage::from_pixel(4, 4, Rgb([shade, shade, shade])), 10.0)
    }

    #[test]
    fn test_worker_records_match() {
        let matcher = SearchMatcher::new("hello").unwrap();
        let ledger = ResultLedger::discard();
        let tracker = ProgressTracker::new(2);
        let ctx = WorkerContext::new(&matcher, &ledger, &tracker, &NoopObserver);
        let factory = MockTextRecognizer::with_fixed_frames(vec![1], "Say\nHELLO\n").into_factory();

        {
            let mut worker = FrameWorker::start(0, &factory, &ctx);
            worker.process(shaded_frame(0));
            worker.process(shaded_frame(1));
        }

        assert_eq!(factory.created(), 1);
        assert_eq!(tracker.completed(), 2);
        assert_eq!(matcher.matched_count(), 1);

        let (failures, matches) = ctx.into_parts();
        assert_eq!(failures, 0);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].frame_index, 1);
        assert_eq!(matches[0].text, "Say HELLO");
        assert_eq!(matches[0].timestamp, "00:00:00.100");
    }

    #[test]
    fn test_worker_without_engine_records_empty_results() {
        let matcher = SearchMatcher::new("x").unwrap();
        let ledger = ResultLedger::discard();
        let tracker = ProgressTracker::new(3);
        let ctx = WorkerContext::new(&matcher, &ledger, &tracker, &NoopObserver);
        let factory = MockRecognizerFactory::unavailable();

        {
            let mut worker = FrameWorker::start(0, &factory, &ctx);
            for i in 0..3 {
                worker.process(shaded_frame(i));
            }
        }

        assert_eq!(tracker.completed(), 3);
        assert_eq!(ledger.pending() as u64 + ledger.written(), 3);
        let (failures, matches) = ctx.into_parts();
        assert_eq!(failures, 3);
        assert!(matches.is_empty());
    }

    #[test]
    fn test_drain_stops_when_cancelled() {
        let matcher = SearchMatcher::new("x").unwrap();
        let ledger = ResultLedger::discard();
        let tracker = ProgressTracker::new(3);
        let ctx = WorkerContext::new(&matcher, &ledger, &tracker, &NoopObserver);
        let factory = MockTextRecognizer::new().into_factory();
        let buffer = FrameBuffer::new();
        buffer.put(shaded_frame(0));

        let cancel = CancellationToken::new();
        cancel.cancel();
        FrameWorker::start(0, &factory, &ctx).drain(&buffer, &cancel);

        assert_eq!(tracker.completed(), 0);
        assert_eq!(buffer.len(), 1);
    }
}
