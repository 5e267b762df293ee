//! Text recognition for annotation crops.
//!
//! The pipeline talks to OCR only through [`OcrEngine`]. [`OcrsEngine`] is the
//! bundled implementation on top of `ocrs`.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use image::RgbImage;
use ocrs::{ImageSource, OcrEngineParams};
use rten::Model;
use serde::{Deserialize, Serialize};

use crate::config::OcrConfig;
use crate::error::Error;
use crate::models::Region;

/// How the engine should segment the crop into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageSegMode {
    Auto,
    SingleLine,
    /// Find as much text as possible in no particular order.
    #[default]
    SparseText,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecognizeOptions {
    pub page_seg_mode: PageSegMode,
    pub char_blacklist: Option<String>,
    pub char_whitelist: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecognizedText {
    pub text: String,
}

/// An OCR backend.
///
/// Implementations may use `async fn`; the returned future must be `Send` so
/// the pipeline can run on a multi-threaded runtime.
pub trait OcrEngine {
    fn recognize(
        &self,
        image: &RgbImage,
        language: &str,
        options: &RecognizeOptions,
    ) -> impl Future<Output = anyhow::Result<RecognizedText>> + Send;
}

/// Longer of the two pass results; the general pass wins ties and a failed
/// pass (`None`) never wins.
pub fn pick_longer_ocr_result(general: Option<String>, digits: Option<String>) -> String {
    match (general, digits) {
        (Some(g), Some(d)) => {
            if d.chars().count() > g.chars().count() { d } else { g }
        }
        (Some(g), None) => g,
        (None, Some(d)) => d,
        (None, None) => String::new(),
    }
}

/// Option sets for the general pass and the digits-only pass.
pub fn pass_options(config: &OcrConfig) -> (RecognizeOptions, RecognizeOptions) {
    let blacklist = (!config.char_blacklist.is_empty()).then(|| config.char_blacklist.clone());
    let general = RecognizeOptions {
        page_seg_mode: config.page_seg_mode,
        char_blacklist: blacklist.clone(),
        char_whitelist: None,
    };
    let digits = RecognizeOptions {
        page_seg_mode: config.page_seg_mode,
        char_blacklist: blacklist,
        char_whitelist: Some(config.digit_whitelist.clone()),
    };
    (general, digits)
}

async fn run_pass<E: OcrEngine>(
    engine: &E,
    region: &Region,
    language: &str,
    options: &RecognizeOptions,
) -> Option<String> {
    match engine.recognize(&region.crop, language, options).await {
        Ok(recognized) => Some(recognized.text),
        Err(source) => {
            let err = Error::OcrEngine {
                region: region.index,
                source,
            };
            tracing::warn!(error = %err, whitelist = ?options.char_whitelist, "OCR pass failed");
            None
        }
    }
}

/// Raw text of one region: a general pass, then a digits-only pass.
///
/// Engine failures are logged and treated as empty output.
pub async fn read_region<E: OcrEngine>(engine: &E, region: &Region, config: &OcrConfig) -> String {
    let (general_opts, digit_opts) = pass_options(config);
    let general = run_pass(engine, region, &config.language, &general_opts).await;
    let digits = run_pass(engine, region, &config.language, &digit_opts).await;
    let text = pick_longer_ocr_result(general, digits);
    tracing::debug!(region = region.index, text = %text, "recognized region");
    text
}

/// Everything `ocrs` can emit for Latin text.
const GENERAL_CHARSET: &str =
    "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~ ";

fn allowed_chars(options: &RecognizeOptions) -> String {
    let base = options.char_whitelist.as_deref().unwrap_or(GENERAL_CHARSET);
    match &options.char_blacklist {
        Some(blacklist) => base.chars().filter(|c| !blacklist.contains(*c)).collect(),
        None => base.to_string(),
    }
}

/// Model files plus the engines built from them, one per character set.
struct EngineCache {
    detection_model: PathBuf,
    recognition_model: PathBuf,
    engines: Mutex<HashMap<String, Arc<ocrs::OcrEngine>>>,
}

impl EngineCache {
    /// Blocks on file reads the first time a charset is seen.
    fn engine_for(&self, charset: String) -> anyhow::Result<Arc<ocrs::OcrEngine>> {
        let mut engines = self
            .engines
            .lock()
            .map_err(|_| anyhow::anyhow!("OCR engine cache poisoned"))?;
        if let Some(engine) = engines.get(&charset) {
            return Ok(engine.clone());
        }

        tracing::debug!(charset = %charset, "loading ocrs models");
        let detection_model = Model::load_file(&self.detection_model)
            .with_context(|| format!("failed to load {}", self.detection_model.display()))?;
        let recognition_model = Model::load_file(&self.recognition_model)
            .with_context(|| format!("failed to load {}", self.recognition_model.display()))?;
        let engine = Arc::new(ocrs::OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            allowed_chars: Some(charset.clone()),
            ..Default::default()
        })?);
        engines.insert(charset, engine.clone());
        Ok(engine)
    }
}

/// `ocrs` engine with models loaded from disk.
///
/// `ocrs` bakes the allowed character set into the engine, so one engine is
/// built per distinct set on first use and shared afterwards. Loading and
/// recognition both run on the blocking pool.
pub struct OcrsEngine {
    cache: Arc<EngineCache>,
}

impl OcrsEngine {
    /// Models from `~/.cache/ocrs`, where `ocrs-cli` downloads them.
    pub fn from_cache_dir() -> anyhow::Result<Self> {
        let home_dir = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .context("cannot locate home directory for the ocrs model cache")?;
        Self::from_model_dir(&Path::new(&home_dir).join(".cache/ocrs"))
    }

    pub fn from_model_dir(dir: &Path) -> anyhow::Result<Self> {
        let detection_model = dir.join("text-detection.rten");
        let recognition_model = dir.join("text-recognition.rten");

        if !detection_model.exists() || !recognition_model.exists() {
            anyhow::bail!(
                "OCR models not found. Run `ocrs-cli` once to download them.\n\
                 Expected locations:\n  - {}\n  - {}",
                detection_model.display(),
                recognition_model.display()
            );
        }

        Ok(Self {
            cache: Arc::new(EngineCache {
                detection_model,
                recognition_model,
                engines: Mutex::new(HashMap::new()),
            }),
        })
    }
}

impl OcrEngine for OcrsEngine {
    async fn recognize(
        &self,
        image: &RgbImage,
        language: &str,
        options: &RecognizeOptions,
    ) -> anyhow::Result<RecognizedText> {
        if language != "eng" {
            tracing::debug!(language, "ocrs only ships Latin models, ignoring language");
        }
        let charset = allowed_chars(options);
        let cache = Arc::clone(&self.cache);
        let image = image.clone();

        // ocrs finds text lines on its own; every mode maps to full-page detection.
        let text = tokio::task::spawn_blocking(move || -> anyhow::Result<String> {
            let engine = cache.engine_for(charset)?;
            let source = ImageSource::from_bytes(image.as_raw(), image.dimensions())?;
            let input = engine.prepare_input(source)?;
            Ok(engine.get_text(&input)?)
        })
        .await
        .context("OCR task panicked")??;

        Ok(RecognizedText {
            text: text.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longer_text_wins() {
        let general = Some("TP 61234".to_string());
        let digits = Some("61234.50 61890.00".to_string());
        assert_eq!(pick_longer_ocr_result(general, digits), "61234.50 61890.00");
    }

    #[test]
    fn general_wins_ties() {
        let out = pick_longer_ocr_result(Some("abc".into()), Some("123".into()));
        assert_eq!(out, "abc");
    }

    #[test]
    fn failed_pass_is_ignored() {
        assert_eq!(pick_longer_ocr_result(None, Some("100.5".into())), "100.5");
        assert_eq!(pick_longer_ocr_result(Some("".into()), None), "");
        assert_eq!(pick_longer_ocr_result(None, None), "");
    }

    #[test]
    fn blacklist_strips_lowercase() {
        let options = RecognizeOptions {
            char_blacklist: Some("abcdefghijklmnopqrstuvwxyz".into()),
            ..Default::default()
        };
        let chars = allowed_chars(&options);
        assert!(chars.contains('T') && chars.contains('7'));
        assert!(!chars.contains('a'));
    }

    #[test]
    fn digit_pass_uses_whitelist() {
        let (general, digits) = pass_options(&OcrConfig::default());
        assert_eq!(general.char_whitelist, None);
        assert_eq!(digits.char_whitelist.as_deref(), Some("0123456789."));
        assert_eq!(allowed_chars(&digits), "0123456789.");
        assert_eq!(general.page_seg_mode, PageSegMode::SparseText);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn unreadable_models_fail_each_call() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("text-detection.rten"), b"not a model").unwrap();
        std::fs::write(dir.path().join("text-recognition.rten"), b"not a model").unwrap();
        let engine = OcrsEngine::from_model_dir(dir.path()).unwrap();
        let image = RgbImage::new(8, 8);

        for _ in 0..2 {
            let err = engine
                .recognize(&image, "eng", &RecognizeOptions::default())
                .await
                .unwrap_err();
            assert!(err.to_string().contains("failed to load"), "{err:#}");
        }
        assert!(engine.cache.engines.lock().unwrap().is_empty());
    }

    #[test]
    fn missing_models_are_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = OcrsEngine::from_model_dir(dir.path()).err().unwrap();
        assert!(err.to_string().contains("OCR models not found"));
    }
}
