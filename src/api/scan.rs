//! 视频文字搜索器

use crate::core::ocr::{RecognizerFactory, TesseractConfig, TesseractFactory};
use crate::core::pipeline::{Pipeline, ResultLedger, ScanConfig, ScanError, ScanObserver, ScanSummary};
use crate::core::video::{FfmpegFrameSource, FrameSource};
use log::info;
use std::path::{Path, PathBuf};

/// 视频文字搜索器 - 找出 OCR 文字包含查询串的帧
///
/// ```no_run
/// use vidtext::{ScanConfig, VideoTextScanner};
/// use vidtext::core::pipeline::NoopObserver;
///
/// let scanner = VideoTextScanner::create(ScanConfig::new("exit 12").with_stride(5));
/// let summary = scanner.scan("dashcam.mp4".as_ref(), Some("hits.tsv".as_ref()), &NoopObserver)?;
/// println!("{} frames matched", summary.frames_matched);
/// # Ok::<(), vidtext::ScanError>(())
/// ```
pub struct VideoTextScanner {
    config: ScanConfig,
    tesseract: TesseractConfig,
    ffmpeg: Option<PathBuf>,
}

impl VideoTextScanner {
    pub fn create(config: ScanConfig) -> Self {
        info!("🎬 VideoTextScanner: created");
        Self {
            config,
            tesseract: TesseractConfig::default(),
            ffmpeg: None,
        }
    }

    pub fn with_tesseract(mut self, tesseract: TesseractConfig) -> Self {
        self.tesseract = tesseract;
        self
    }

    /// 使用指定的 ffmpeg，而不是 `PATH` 中的
    pub fn with_ffmpeg(mut self, ffmpeg: impl Into<PathBuf>) -> Self {
        self.ffmpeg = Some(ffmpeg.into());
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// 用 ffmpeg 解码、tesseract 识别
    ///
    /// 先校验查询串，再打开视频，最后才创建输出文件；配置或视频错误不会留下输出文件。
    pub fn scan(
        &self,
        video_path: &Path,
        output: Option<&Path>,
        observer: &dyn ScanObserver,
    ) -> Result<ScanSummary, ScanError> {
        let pipeline = Pipeline::new(self.config.clone())?;
        let mut source =
            FfmpegFrameSource::open_with_binary(self.ffmpeg.as_deref(), video_path, self.config.stride)?;
        let factory = TesseractFactory::new(self.tesseract.clone());
        let summary = Self::run(pipeline, &mut source, &factory, output, observer)?;
        info!(
            "🔤 {} tesseract engine(s) loaded for {} worker(s)",
            factory.engines_loaded(),
            summary.workers
        );
        Ok(summary)
    }

    /// 同 [`scan`](Self::scan)，帧来源和识别器由调用方提供
    pub fn scan_source<S: FrameSource + ?Sized>(
        &self,
        source: &mut S,
        factory: &dyn RecognizerFactory,
        output: Option<&Path>,
        observer: &dyn ScanObserver,
    ) -> Result<ScanSummary, ScanError> {
        let pipeline = Pipeline::new(self.config.clone())?;
        Self::run(pipeline, source, factory, output, observer)
    }

    fn run<S: FrameSource + ?Sized>(
        pipeline: Pipeline,
        source: &mut S,
        factory: &dyn RecognizerFactory,
        output: Option<&Path>,
        observer: &dyn ScanObserver,
    ) -> Result<ScanSummary, ScanError> {
        let ledger = match output {
            Some(path) => ResultLedger::create(path, pipeline.config().flush_every)?,
            None => ResultLedger::discard(),
        };
        pipeline.run(source, factory, ledger, observer)
    }
}

impl Drop for VideoTextScanner {
    fn drop(&mut self) {
        info!("🗑️ VideoTextScanner: released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ocr::MockTextRecognizer;
    use crate::core::pipeline::{NoopObserver, OUTPUT_HEADER};
    use crate::core::video::SyntheticFrameSource;

    #[test]
    fn test_empty_query_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.tsv");
        let scanner = VideoTextScanner::create(ScanConfig::new(""));

        let result = scanner.scan(Path::new("/no/such/video.mp4"), Some(&output), &NoopObserver);

        assert!(matches!(result, Err(ScanError::EmptyQuery)));
        assert!(!output.exists());
    }

    #[test]
    fn test_missing_video_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.tsv");
        let scanner = VideoTextScanner::create(ScanConfig::new("hello"));

        let result = scanner.scan(&dir.path().join("missing.mp4"), Some(&output), &NoopObserver);

        assert!(matches!(result, Err(ScanError::Source(_))));
        assert!(!output.exists());
    }

    #[test]
    fn test_unwritable_output_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("no-such-dir").join("out.tsv");
        let scanner = VideoTextScanner::create(ScanConfig::sequential("hello"));
        let factory = MockTextRecognizer::new().into_factory();
        let mut source = SyntheticFrameSource::new(3, 10.0);

        let result = scanner.scan_source(&mut source, &factory, Some(&output), &NoopObserver);

        assert!(matches!(result, Err(ScanError::Persistence(_))));
    }

    #[test]
    fn test_scan_source_without_output_file() {
        let scanner = VideoTextScanner::create(ScanConfig::new("\"hello\"").with_workers(2));
        let factory = MockTextRecognizer::with_fixed_frames(vec![2, 5], "HELLO").into_factory();
        let mut source = SyntheticFrameSource::new(10, 10.0);

        let summary = scanner
            .scan_source(&mut source, &factory, None, &NoopObserver)
            .unwrap();

        assert_eq!(summary.query, "hello");
        assert_eq!(summary.frames_processed, 10);
        assert_eq!(summary.frames_matched, 2);
        assert_eq!(summary.lines_written, 10);
    }

    #[test]
    fn test_scan_source_with_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.tsv");
        let scanner = VideoTextScanner::create(ScanConfig::new("hello").with_stride(2));
        let factory = MockTextRecognizer::new().into_factory();
        let mut source = SyntheticFrameSource::new(5, 10.0).with_stride(2);

        scanner
            .scan_source(&mut source, &factory, Some(&output), &NoopObserver)
            .unwrap();

        let content = std::fs::read_to_string(&output).unwrap();
        assert_eq!(
            content,
            format!(
                "{}\n0\t00:00:00.000\t\n2\t00:00:00.200\t\n4\t00:00:00.400\t\n",
                OUTPUT_HEADER
            )
        );
    }
}
