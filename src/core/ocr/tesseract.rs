//! Tesseract OCR 引擎

use super::error::RecognitionError;
use super::recognizer::{RecognizerFactory, TextRecognizer};
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Tesseract 配置
#[derive(Debug, Clone)]
pub struct TesseractConfig {
    /// 语言包，如 `eng`、`eng+deu`
    pub language: String,
    /// traineddata 所在目录，`None` 时使用 tesseract 自带路径
    pub tessdata_dir: Option<PathBuf>,
    /// 页面分割模式 (`--psm`)
    pub page_segmentation_mode: Option<u8>,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        let local_tessdata = Path::new("./tessdata");
        Self {
            language: "eng".to_string(),
            tessdata_dir: local_tessdata
                .is_dir()
                .then(|| local_tessdata.to_path_buf()),
            page_segmentation_mode: None,
        }
    }
}

impl TesseractConfig {
    fn tessdata_str(&self) -> Result<Option<&str>, RecognitionError> {
        match &self.tessdata_dir {
            None => Ok(None),
            Some(dir) => dir.to_str().map(Some).ok_or_else(|| {
                RecognitionError::EngineUnavailable(format!(
                    "tessdata path is not valid UTF-8: {:?}",
                    dir
                ))
            }),
        }
    }
}

#[cfg(feature = "tesseract")]
mod engine {
    use super::{RecognitionError, TesseractConfig, TextRecognizer};
    use image::{GrayImage, ImageOutputFormat};
    use leptess::{LepTess, Variable};
    use log::{debug, error};
    use std::io::Cursor;

    /// Tesseract 实例（每个 worker 持有一个，模型只加载一次）
    pub struct TesseractRecognizer {
        engine: LepTess,
    }

    impl TesseractRecognizer {
        pub fn new(config: &TesseractConfig) -> Result<Self, RecognitionError> {
            debug!(
                "🔧 Loading tesseract (lang: {}, tessdata: {:?})",
                config.language, config.tessdata_dir
            );

            let mut engine = LepTess::new(config.tessdata_str()?, &config.language).map_err(|e| {
                error!("❌ Failed to load tesseract: {:?}", e);
                RecognitionError::EngineUnavailable(format!(
                    "cannot load language {:?} from {:?}: {:?}",
                    config.language, config.tessdata_dir, e
                ))
            })?;

            if let Some(psm) = config.page_segmentation_mode {
                engine
                    .set_variable(Variable::TesseditPagesegMode, &psm.to_string())
                    .map_err(|e| {
                        RecognitionError::EngineUnavailable(format!("invalid psm {}: {:?}", psm, e))
                    })?;
            }

            debug!("✅ Tesseract ready");
            Ok(Self { engine })
        }
    }

    impl TextRecognizer for TesseractRecognizer {
        fn recognize(&mut self, image: &GrayImage) -> Result<String, RecognitionError> {
            let mut png = Cursor::new(Vec::new());
            image.write_to(&mut png, ImageOutputFormat::Png)?;

            self.engine
                .set_image_from_mem(png.get_ref())
                .map_err(|e| RecognitionError::EngineFailed(format!("cannot load image: {:?}", e)))?;
            self.engine
                .get_utf8_text()
                .map_err(|e| RecognitionError::EngineFailed(format!("invalid UTF-8 output: {}", e)))
        }
    }

    impl Drop for TesseractRecognizer {
        fn drop(&mut self) {
            debug!("🗑️ TesseractRecognizer: released");
        }
    }
}

#[cfg(feature = "tesseract")]
pub use engine::TesseractRecognizer;

/// 为每个 worker 创建一个 Tesseract 实例
pub struct TesseractFactory {
    config: TesseractConfig,
    loaded: AtomicUsize,
}

impl TesseractFactory {
    pub fn new(config: TesseractConfig) -> Self {
        info!(
            "🔤 OCR engine: tesseract (lang: {}, tessdata: {:?})",
            config.language, config.tessdata_dir
        );
        Self {
            config,
            loaded: AtomicUsize::new(0),
        }
    }

    /// 成功加载的引擎数量
    pub fn engines_loaded(&self) -> usize {
        self.loaded.load(Ordering::SeqCst)
    }

    #[cfg(feature = "tesseract")]
    fn load(&self) -> Result<Box<dyn TextRecognizer>, RecognitionError> {
        Ok(Box::new(TesseractRecognizer::new(&self.config)?))
    }

    #[cfg(not(feature = "tesseract"))]
    fn load(&self) -> Result<Box<dyn TextRecognizer>, RecognitionError> {
        self.config.tessdata_str()?;
        Err(RecognitionError::EngineUnavailable(
            "built without the `tesseract` feature".to_string(),
        ))
    }
}

impl RecognizerFactory for TesseractFactory {
    fn create(&self) -> Result<Box<dyn TextRecognizer>, RecognitionError> {
        let recognizer = self.load()?;
        let loaded = self.loaded.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Tesseract engines loaded: {}", loaded);
        Ok(recognizer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_language() {
        let config = TesseractConfig::default();
        assert_eq!(config.language, "eng");
        assert_eq!(config.page_segmentation_mode, None);
    }

    #[test]
    fn test_engine_is_loaded_by_create() {
        let empty = tempfile::tempdir().unwrap();
        let factory = TesseractFactory::new(TesseractConfig {
            language: "zzz_missing".to_string(),
            tessdata_dir: Some(empty.path().to_path_buf()),
            page_segmentation_mode: None,
        });

        // 语言包缺失时在 create 阶段就失败，而不是等到第一帧
        assert!(matches!(
            factory.create(),
            Err(RecognitionError::EngineUnavailable(_))
        ));
        assert_eq!(factory.engines_loaded(), 0);
    }
}
