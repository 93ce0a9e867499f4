//! 帧来源抽象

use super::error::DecodeError;
use super::frame::Frame;
use image::{Rgb, RgbImage};
use serde::Serialize;

const FRAME_SIZE: u32 = 16;

/// 打开视频时得到的流信息
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SourceInfo {
    /// 容器报告的帧数，只用于进度估算；以解码器读到结尾为准
    pub frame_count: u64,
    pub frame_rate: f64,
    pub stride: u64,
}

impl SourceInfo {
    /// 按 stride 抽帧后应得的帧数，即 `{0, stride, 2 * stride, ...} ∩ [0, frame_count)` 的大小
    pub fn expected_frames(&self) -> u64 {
        let stride = self.stride.max(1);
        self.frame_count.div_ceil(stride)
    }
}

/// 按顺序产出视频帧
pub trait FrameSource {
    fn info(&self) -> SourceInfo;

    /// 解码下一帧，`Ok(None)` 表示流结束。帧序号严格递增，间隔为 stride
    fn next_frame(&mut self) -> Result<Option<Frame>, DecodeError>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn info(&self) -> SourceInfo {
        (**self).info()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, DecodeError> {
        (**self).next_frame()
    }
}

/// 内存中的纯色帧来源，不依赖真实视频驱动流水线
///
/// 第 `i` 帧的灰度值为 `i % 256`。
pub struct SyntheticFrameSource {
    frame_count: u64,
    reported_count: u64,
    frame_rate: f64,
    stride: u64,
    fail_at: Option<u64>,
    next_index: u64,
}

impl SyntheticFrameSource {
    pub fn new(frame_count: u64, frame_rate: f64) -> Self {
        Self {
            frame_count,
            reported_count: frame_count,
            frame_rate,
            stride: 1,
            fail_at: None,
            next_index: 0,
        }
    }

    pub fn with_stride(mut self, stride: u64) -> Self {
        self.stride = stride.max(1);
        self
    }

    /// 报告与实际不符的帧数，模拟头信息不准的容器
    pub fn with_reported_count(mut self, reported_count: u64) -> Self {
        self.reported_count = reported_count;
        self
    }

    /// 解码到第 `index` 帧时返回错误
    pub fn failing_at(mut self, index: u64) -> Self {
        self.fail_at = Some(index);
        self
    }
}

impl FrameSource for SyntheticFrameSource {
    fn info(&self) -> SourceInfo {
        SourceInfo {
            frame_count: self.reported_count,
            frame_rate: self.frame_rate,
            stride: self.stride,
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, DecodeError> {
        let index = self.next_index;
        if index >= self.frame_count {
            return Ok(None);
        }
        if self.fail_at == Some(index) {
            return Err(DecodeError::InvalidFrame(format!(
                "synthetic failure at frame {}",
                index
            )));
        }
        self.next_index += self.stride;

        let shade = (index % 256) as u8;
        let image = RgbImage::from_pixel(FRAME_SIZE, FRAME_SIZE, Rgb([shade, shade, shade]));
        Ok(Some(Frame::new(index, image, self.frame_rate)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(source: &mut dyn FrameSource) -> Vec<u64> {
        let mut indices = Vec::new();
        while let Ok(Some(frame)) = source.next_frame() {
            indices.push(frame.index);
        }
        indices
    }

    #[test]
    fn test_expected_frames() {
        let info = |frame_count, stride| SourceInfo {
            frame_count,
            frame_rate: 25.0,
            stride,
        };
        assert_eq!(info(10, 1).expected_frames(), 10);
        assert_eq!(info(10, 3).expected_frames(), 4);
        assert_eq!(info(9, 3).expected_frames(), 3);
        assert_eq!(info(0, 5).expected_frames(), 0);
        assert_eq!(info(10, 0).expected_frames(), 10);
    }

    #[test]
    fn test_synthetic_source_stride() {
        let mut source = SyntheticFrameSource::new(10, 10.0).with_stride(3);
        assert_eq!(drain(&mut source), vec![0, 3, 6, 9]);
        assert_eq!(source.info().expected_frames(), 4);
    }

    #[test]
    fn test_synthetic_source_zero_stride_is_one() {
        let mut source = SyntheticFrameSource::new(4, 10.0).with_stride(0);
        assert_eq!(drain(&mut source), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_synthetic_source_failure() {
        let mut source = SyntheticFrameSource::new(10, 10.0).failing_at(2);
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_some());
        assert!(matches!(
            source.next_frame(),
            Err(DecodeError::InvalidFrame(_))
        ));
    }

    #[test]
    fn test_boxed_source() {
        let mut source: Box<dyn FrameSource> = Box::new(SyntheticFrameSource::new(3, 30.0));
        assert_eq!(source.info().frame_count, 3);
        assert_eq!(drain(&mut source), vec![0, 1, 2]);
    }
}
