use super::error::RecognitionError;
use image::GrayImage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// 文字识别引擎实例
///
/// 创建开销大，由单个 worker 在整个运行期间独占，因此用 `&mut self`，不要求 `Sync`。
pub trait TextRecognizer {
    fn recognize(&mut self, image: &GrayImage) -> Result<String, RecognitionError>;
}

/// 为每个 worker 创建一个识别器
pub trait RecognizerFactory: Sync {
    fn create(&self) -> Result<Box<dyn TextRecognizer>, RecognitionError>;
}

impl<F> RecognizerFactory for F
where
    F: Fn() -> Result<Box<dyn TextRecognizer>, RecognitionError> + Sync,
{
    fn create(&self) -> Result<Box<dyn TextRecognizer>, RecognitionError> {
        self()
    }
}

/// 把识别结果压成一行（可安全写入 TSV）
pub fn normalize_text(raw: &str) -> String {
    let collapsed: String = raw
        .chars()
        .filter(|&c| c != '\u{c}')
        .map(|c| match c {
            '\r' | '\n' | '\t' => ' ',
            other => other,
        })
        .collect();
    collapsed.trim().to_string()
}

type ShadeFn<T> = Arc<dyn Fn(u8) -> T + Send + Sync>;

/// 模拟识别器：按帧的灰度值决定返回的文字
///
/// 取左上角像素的灰度值；`SyntheticFrameSource` 的第 `i` 帧灰度为 `i % 256`，
/// 测试可以据此按帧序号指定结果。
#[derive(Clone)]
pub struct MockTextRecognizer {
    text_pattern: ShadeFn<Option<String>>,
    failure_pattern: ShadeFn<bool>,
    delay: ShadeFn<Duration>,
}

impl MockTextRecognizer {
    pub fn new() -> Self {
        Self::with_pattern(|_| None)
    }

    pub fn with_pattern<F>(pattern: F) -> Self
    where
        F: Fn(u8) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            text_pattern: Arc::new(pattern),
            failure_pattern: Arc::new(|_| false),
            delay: Arc::new(|_| Duration::ZERO),
        }
    }

    /// 指定灰度返回 `text`，其余返回空串
    pub fn with_fixed_frames(shades: Vec<u8>, text: &str) -> Self {
        let text = text.to_string();
        Self::with_pattern(move |shade| shades.contains(&shade).then(|| text.clone()))
    }

    pub fn failing_on<F>(mut self, pattern: F) -> Self
    where
        F: Fn(u8) -> bool + Send + Sync + 'static,
    {
        self.failure_pattern = Arc::new(pattern);
        self
    }

    /// 识别前先休眠，用于制造乱序完成
    pub fn with_delay<F>(mut self, delay: F) -> Self
    where
        F: Fn(u8) -> Duration + Send + Sync + 'static,
    {
        self.delay = Arc::new(delay);
        self
    }

    pub fn into_factory(self) -> MockRecognizerFactory {
        MockRecognizerFactory::new(self)
    }
}

impl Default for MockTextRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextRecognizer for MockTextRecognizer {
    fn recognize(&mut self, image: &GrayImage) -> Result<String, RecognitionError> {
        let shade = image.get_pixel_checked(0, 0).map(|p| p.0[0]).unwrap_or(0);

        let delay = (self.delay)(shade);
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        if (self.failure_pattern)(shade) {
            return Err(RecognitionError::EngineFailed(format!(
                "mock failure for shade {}",
                shade
            )));
        }

        Ok((self.text_pattern)(shade).unwrap_or_default())
    }
}

/// 克隆模板识别器，并统计创建次数
pub struct MockRecognizerFactory {
    template: MockTextRecognizer,
    created: AtomicUsize,
    fail_creation: bool,
}

impl MockRecognizerFactory {
    pub fn new(template: MockTextRecognizer) -> Self {
        Self {
            template,
            created: AtomicUsize::new(0),
            fail_creation: false,
        }
    }

    /// 每次 `create` 都失败，模拟模型文件缺失
    pub fn unavailable() -> Self {
        Self {
            fail_creation: true,
            ..Self::new(MockTextRecognizer::new())
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl RecognizerFactory for MockRecognizerFactory {
    fn create(&self) -> Result<Box<dyn TextRecognizer>, RecognitionError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        if self.fail_creation {
            return Err(RecognitionError::EngineUnavailable(
                "mock engine unavailable".to_string(),
            ));
        }
        Ok(Box::new(self.template.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn shade_image(shade: u8) -> GrayImage {
        GrayImage::from_pixel(8, 8, Luma([shade]))
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("HELLO\nWORLD\n\u{c}"), "HELLO WORLD");
        assert_eq!(normalize_text("a\tb\r\nc"), "a b  c");
        assert_eq!(normalize_text("  \n"), "");
    }

    #[test]
    fn test_mock_recognizer_with_fixed_frames() {
        let mut recognizer = MockTextRecognizer::with_fixed_frames(vec![2, 5], "HELLO");

        assert_eq!(recognizer.recognize(&shade_image(2)).unwrap(), "HELLO");
        assert_eq!(recognizer.recognize(&shade_image(5)).unwrap(), "HELLO");
        assert_eq!(recognizer.recognize(&shade_image(3)).unwrap(), "");
    }

    #[test]
    fn test_mock_recognizer_failure() {
        let mut recognizer = MockTextRecognizer::new().failing_on(|shade| shade == 7);

        assert!(recognizer.recognize(&shade_image(6)).is_ok());
        assert!(matches!(
            recognizer.recognize(&shade_image(7)),
            Err(RecognitionError::EngineFailed(_))
        ));
    }

    #[test]
    fn test_mock_factory_counts_instances() {
        let factory = MockTextRecognizer::new().into_factory();
        let _a = factory.create().unwrap();
        let _b = factory.create().unwrap();
        assert_eq!(factory.created(), 2);

        let unavailable = MockRecognizerFactory::unavailable();
        assert!(unavailable.create().is_err());
        assert_eq!(unavailable.created(), 1);
    }

    #[test]
    fn test_closure_factory() {
        let factory = || -> Result<Box<dyn TextRecognizer>, RecognitionError> {
            Ok(Box::new(MockTextRecognizer::with_pattern(|_| Some("x".into()))))
        };
        let mut recognizer = factory.create().unwrap();
        assert_eq!(recognizer.recognize(&shade_image(0)).unwrap(), "x");
    }
}
