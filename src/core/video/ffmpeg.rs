//! ffmpeg 视频解码 - 通过 ffmpeg-sidecar 调用外部 ffmpeg 进程

use super::error::DecodeError;
use super::frame::Frame;
use super::source::{FrameSource, SourceInfo};
use ffmpeg_sidecar::child::FfmpegChild;
use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::{FfmpegEvent, OutputVideoFrame};
use ffmpeg_sidecar::iter::FfmpegIterator;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

/// ffmpeg 帧来源 - 调用独立的 ffmpeg 进程解码为 RGB24
pub struct FfmpegFrameSource {
    child: FfmpegChild,
    events: FfmpegIterator,
    info: SourceInfo,
    pending: Option<OutputVideoFrame>,
    emitted: u64,
}

impl FfmpegFrameSource {
    pub fn open(path: impl AsRef<Path>, stride: u64) -> Result<Self, DecodeError> {
        Self::open_with_binary(None, path, stride)
    }

    /// 用指定（或 `PATH` 中）的 ffmpeg 打开视频
    ///
    /// 读取流信息直到第一帧，无法读取的文件在这里就失败。
    pub fn open_with_binary(
        ffmpeg: Option<&Path>,
        path: impl AsRef<Path>,
        stride: u64,
    ) -> Result<Self, DecodeError> {
        let path = path.as_ref();
        let stride = stride.max(1);

        if !path.is_file() {
            return Err(unavailable(path, "file does not exist"));
        }

        info!("🎬 Opening video with ffmpeg: {:?} (stride {})", path, stride);

        let mut child = decode_command(ffmpeg, path, stride)
            .spawn()
            .map_err(|e| unavailable(path, &format!("failed to spawn ffmpeg: {}", e)))?;
        let mut events = match child.iter() {
            Ok(events) => events,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(unavailable(path, &e.to_string()));
            }
        };

        let mut frame_rate: Option<f64> = None;
        let mut duration: Option<f64> = None;
        let mut pending = None;
        let mut errors = Vec::new();

        for event in events.by_ref() {
            match event {
                FfmpegEvent::ParsedInputStream(stream) => {
                    if let Some(video) = stream.video_data() {
                        frame_rate.get_or_insert(video.fps as f64);
                    }
                }
                FfmpegEvent::ParsedDuration(parsed) => {
                    duration.get_or_insert(parsed.duration);
                }
                FfmpegEvent::OutputFrame(frame) => {
                    pending = Some(frame);
                    break;
                }
                FfmpegEvent::Error(message) => {
                    debug!("[ffmpeg] {}", message);
                    errors.push(message);
                }
                _ => {}
            }
        }

        let Some(frame_rate) = frame_rate else {
            let _ = child.kill();
            let _ = child.wait();
            let reason = errors
                .pop()
                .unwrap_or_else(|| "no video stream found".to_string());
            return Err(unavailable(path, &reason));
        };

        let frame_count = duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| (d * frame_rate).round() as u64)
            .unwrap_or(0);

        let info = SourceInfo {
            frame_count,
            frame_rate,
            stride,
        };
        info!(
            "✅ Video loaded. Frame count: {}, FPS: {:.3}, Skip Frames: {}",
            info.frame_count, info.frame_rate, info.stride
        );

        Ok(Self {
            child,
            events,
            info,
            pending,
            emitted: 0,
        })
    }

    fn to_frame(&mut self, raw: OutputVideoFrame) -> Result<Frame, DecodeError> {
        let index = self.emitted * self.info.stride;
        let (width, height) = (raw.width, raw.height);
        let frame = Frame::from_rgb24(index, width, height, raw.data, self.info.frame_rate)
            .ok_or_else(|| {
                DecodeError::InvalidFrame(format!(
                    "frame {} buffer does not match {}x{} rgb24",
                    index, width, height
                ))
            })?;
        self.emitted += 1;
        Ok(frame)
    }
}

impl FrameSource for FfmpegFrameSource {
    fn info(&self) -> SourceInfo {
        self.info
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, DecodeError> {
        if let Some(raw) = self.pending.take() {
            return self.to_frame(raw).map(Some);
        }

        while let Some(event) = self.events.next() {
            match event {
                FfmpegEvent::OutputFrame(raw) => return self.to_frame(raw).map(Some),
                FfmpegEvent::Error(message) => {
                    warn!("⚠️ ffmpeg reported an error after {} frames", self.emitted);
                    return Err(DecodeError::Ffmpeg(message));
                }
                FfmpegEvent::Log(_, message) => debug!("[ffmpeg] {}", message),
                _ => {}
            }
        }

        debug!("ffmpeg output ended after {} frames", self.emitted);
        Ok(None)
    }
}

impl Drop for FfmpegFrameSource {
    fn drop(&mut self) {
        // ffmpeg is still writing if extraction stopped early
        let _ = self.child.kill();
        let _ = self.child.wait();
        info!("🗑️ FfmpegFrameSource: released ffmpeg process");
    }
}

/// 解码为 rgb24 原始帧；stride > 1 时由 ffmpeg 的 select 滤镜抽帧
fn decode_command(ffmpeg: Option<&Path>, path: &Path, stride: u64) -> FfmpegCommand {
    let mut command = match ffmpeg {
        Some(binary) => FfmpegCommand::new_with_path(binary),
        None => FfmpegCommand::new(),
    };
    command.input(path);
    if stride > 1 {
        let filter = select_filter(stride);
        command.args(["-vf", filter.as_str(), "-fps_mode", "passthrough"]);
    }
    command.rawvideo();
    command
}

fn select_filter(stride: u64) -> String {
    format!("select=not(mod(n\\,{}))", stride)
}

fn unavailable(path: &Path, reason: &str) -> DecodeError {
    DecodeError::SourceUnavailable {
        path: PathBuf::from(path),
        reason: reason.to_string(),
    }
}
