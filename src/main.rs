//! vidtext - 在视频帧中搜索文字
//!
//! 解析命令行、在终端显示进度，实际工作交给 [`VideoTextScanner`]。

use anyhow::Context;
use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;
use vidtext::core::pipeline::{clamp_stride, describe_match, format_clock, ProgressSnapshot, RecognitionResult};
use vidtext::core::video::SourceInfo;
use vidtext::{
    ExecutionMode, ScanConfig, ScanObserver, ScanSummary, TesseractConfig, VideoTextScanner,
};

/// Search the frames of a video for a piece of text using OCR.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Text to look for (case-insensitive, surrounding quotes are ignored)
    search_text: String,

    /// Path to the input video file
    video_path: PathBuf,

    /// Tab-separated file receiving the text of every processed frame
    output_file: Option<PathBuf>,

    /// Process every Nth frame (values below 1 mean every frame)
    #[arg(allow_negative_numbers = true)]
    skip_frames: Option<i64>,

    /// Number of OCR workers (defaults to the number of CPUs minus one)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Write buffered results to the output file every N frames
    #[arg(long, default_value_t = vidtext::core::pipeline::DEFAULT_FLUSH_EVERY)]
    flush_every: usize,

    /// How extraction and recognition are scheduled
    #[arg(short, long, value_enum, default_value_t = Mode::Streaming)]
    mode: Mode,

    /// OCR language (e.g., "eng" for English, "spa" for Spanish)
    #[arg(short, long, default_value_t = String::from("eng"))]
    lang: String,

    /// Directory holding the tesseract language data
    #[arg(long)]
    tessdata_dir: Option<PathBuf>,

    /// Tesseract page segmentation mode
    #[arg(long)]
    psm: Option<u8>,

    /// ffmpeg binary to use instead of the one on PATH
    #[arg(long)]
    ffmpeg: Option<PathBuf>,

    /// Also write the final summary as JSON
    #[arg(long)]
    summary_json: Option<PathBuf>,

    /// Logging verbosity level (RUST_LOG takes precedence)
    #[arg(long, value_enum, default_value_t = LogLevel::Warn)]
    log_level: LogLevel,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum Mode {
    Sequential,
    Batched,
    Streaming,
}

impl From<Mode> for ExecutionMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Sequential => ExecutionMode::Sequential,
            Mode::Batched => ExecutionMode::Batched,
            Mode::Streaming => ExecutionMode::Streaming,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

/// 终端进度条：抽帧、OCR 各一条
struct ConsoleObserver {
    bars: MultiProgress,
    extraction: ProgressBar,
    processing: ProgressBar,
}

impl ConsoleObserver {
    fn new() -> Self {
        let style = ProgressStyle::with_template("{prefix:>10} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        let bars = MultiProgress::new();
        let extraction = bars.add(ProgressBar::new(0).with_style(style.clone()));
        extraction.set_prefix("Extracting");
        let processing = bars.add(ProgressBar::new(0).with_style(style));
        processing.set_prefix("OCR");
        Self {
            bars,
            extraction,
            processing,
        }
    }

    fn finish(&self) {
        self.extraction.finish();
        self.processing.finish();
    }
}

impl ScanObserver for ConsoleObserver {
    fn on_source_opened(&self, info: &SourceInfo) {
        self.extraction.set_length(info.expected_frames());
        self.processing.set_length(info.expected_frames());
    }

    fn on_extracted(&self, progress: ProgressSnapshot) {
        self.extraction.set_position(progress.completed);
        self.extraction.set_message(progress.render());
    }

    fn on_extraction_finished(&self, extracted: u64) {
        self.extraction.set_length(extracted);
        self.processing.set_length(extracted);
        self.extraction.finish();
    }

    fn on_processed(&self, progress: ProgressSnapshot) {
        self.processing.set_position(progress.completed);
        self.processing.set_message(progress.render());
    }

    fn on_match(&self, result: &RecognitionResult) {
        // println keeps the bars intact
        let _ = self.bars.println(describe_match(result));
    }
}

fn print_summary(summary: &ScanSummary) {
    println!();
    println!("Total frames processed: {}", summary.frames_processed);
    println!("Total frames with text found: {}", summary.frames_matched);
    if summary.recognition_failures > 0 {
        println!("Frames where OCR failed: {}", summary.recognition_failures);
    }
    println!("Elapsed time: {}", format_clock(summary.elapsed));
}

fn run(args: Args) -> anyhow::Result<()> {
    let mut config = ScanConfig::new(args.search_text.as_str())
        .with_stride(args.skip_frames.map_or(1, clamp_stride))
        .with_flush_every(args.flush_every)
        .with_mode(args.mode.into());
    if let Some(workers) = args.workers {
        config = config.with_workers(workers);
    }

    let mut tesseract = TesseractConfig {
        language: args.lang,
        page_segmentation_mode: args.psm,
        ..TesseractConfig::default()
    };
    if let Some(dir) = args.tessdata_dir {
        tesseract.tessdata_dir = Some(dir);
    }

    let mut scanner = VideoTextScanner::create(config).with_tesseract(tesseract);
    if let Some(ffmpeg) = args.ffmpeg {
        scanner = scanner.with_ffmpeg(ffmpeg);
    }

    let observer = ConsoleObserver::new();
    let result = scanner.scan(&args.video_path, args.output_file.as_deref(), &observer);
    observer.finish();
    let summary = result?;

    print_summary(&summary);
    if let Some(path) = args.summary_json {
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write summary to {}", path.display()))?;
        info!("📄 Summary written to {:?}", path);
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    vidtext::init_logging(args.log_level.as_filter());

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
