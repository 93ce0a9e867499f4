use image::{GrayImage, RgbImage};
use std::time::Duration;

/// 帧数据结构
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: u64,
    pub image: RgbImage,
    pub timestamp: Duration,
}

impl Frame {
    pub fn new(index: u64, image: RgbImage, frame_rate: f64) -> Self {
        Self {
            index,
            image,
            timestamp: timestamp_for(index, frame_rate),
        }
    }

    /// 从解码器给出的 RGB24 数据构建帧
    pub fn from_rgb24(
        index: u64,
        width: u32,
        height: u32,
        data: Vec<u8>,
        frame_rate: f64,
    ) -> Option<Self> {
        RgbImage::from_raw(width, height, data).map(|image| Self::new(index, image, frame_rate))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel_count(&self) -> usize {
        (self.width() * self.height()) as usize
    }

    /// 转为灰度图（返回新的缓冲区）
    pub fn to_grayscale(&self) -> GrayImage {
        image::imageops::grayscale(&self.image)
    }
}

/// 第 `index` 帧的时间戳，精确到毫秒
///
/// 帧率非正或非有限值时返回 0。
pub fn timestamp_for(index: u64, frame_rate: f64) -> Duration {
    if !frame_rate.is_finite() || frame_rate <= 0.0 {
        return Duration::ZERO;
    }
    let millis = (index as f64 * 1000.0 / frame_rate).round();
    Duration::from_millis(millis as u64)
}

/// 格式化为 `hh:mm:ss.fff`
pub fn format_timestamp(timestamp: Duration) -> String {
    let total_ms = timestamp.as_millis();
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, millis)
}
