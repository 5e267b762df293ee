use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;

use futures_util::stream::{self, StreamExt};
use image::{DynamicImage, RgbImage};

use crate::config::{DetectionStrategy, PipelineConfig};
use crate::detection::{self, OcrEngine, preprocessing, regions};
use crate::error::{Error, Result};
use crate::levels::{NumberParser, assemble_levels};
use crate::models::{ExtractedTradeLevels, OcrResult, ParsedLevels, RectangleDetection, Region};

/// Where intermediate images are written.
#[derive(Clone, Debug)]
pub struct DebugConfig {
    pub output_dir: PathBuf,
}

impl DebugConfig {
    /// The directory must be empty or not exist yet.
    pub fn new(output_dir: PathBuf) -> Result<Self> {
        let io_err = |e: std::io::Error| Error::DebugOutput {
            path: output_dir.clone(),
            source: e.into(),
        };

        if output_dir.exists() {
            let mut entries = std::fs::read_dir(&output_dir).map_err(io_err)?;
            if entries.next().is_some() {
                return Err(Error::DebugOutput {
                    path: output_dir.clone(),
                    source: anyhow::anyhow!("debug directory is not empty"),
                });
            }
        } else {
            std::fs::create_dir_all(&output_dir).map_err(io_err)?;
        }

        Ok(Self { output_dir })
    }

    /// Save `image` as `<step>/<file>`.
    fn save(&self, step: &str, file: &str, image: DynamicImage) -> Result<()> {
        let dir = self.output_dir.join(step);
        std::fs::create_dir_all(&dir).map_err(|e| Error::DebugOutput {
            path: dir.clone(),
            source: e.into(),
        })?;

        let path = dir.join(file);
        image.save(&path).map_err(|e| Error::DebugOutput {
            path: path.clone(),
            source: e.into(),
        })?;
        tracing::debug!(path = %path.display(), "saved debug image");
        Ok(())
    }
}

/// Preprocessing plus annotation detection, without OCR.
#[derive(Clone, Debug, Default)]
pub struct ChartDetector {
    config: PipelineConfig,
    debug: Option<DebugConfig>,
}

/// Enhanced image and the boxes found on it.
pub struct Located {
    pub enhanced: RgbImage,
    pub detections: Vec<RectangleDetection>,
}

impl ChartDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        self.debug = Some(DebugConfig::new(output_dir)?);
        Ok(self)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn dump(&self, step: &str, file: &str, image: impl FnOnce() -> DynamicImage) -> Result<()> {
        match &self.debug {
            Some(debug) => debug.save(step, file, image()),
            None => Ok(()),
        }
    }

    pub fn locate(&self, decoded: &RgbImage) -> Result<Located> {
        self.dump("00_input", "01.png", || DynamicImage::ImageRgb8(decoded.clone()))?;

        let enhanced = preprocessing::enhance(decoded, &self.config.preprocess);
        self.dump("01_preprocessed", "01.png", || DynamicImage::ImageRgb8(enhanced.clone()))?;

        let found = detection::detect_annotations(decoded, &enhanced, &self.config)?;
        if let Some(mask) = found.mask {
            self.dump("02_annotation_mask", "01.png", || DynamicImage::ImageLuma8(mask))?;
        }

        Ok(Located {
            enhanced,
            detections: found.boxes,
        })
    }

    /// Detected boxes in scan order.
    pub fn detect(&self, decoded: &RgbImage) -> Result<Vec<RectangleDetection>> {
        Ok(self.locate(decoded)?.detections)
    }

    /// Marker boxes are cut from the enhanced image. Price-axis labels are cut
    /// from `decoded`, matching where they were detected.
    pub fn crop(&self, decoded: &RgbImage, located: &Located) -> Result<Vec<Region>> {
        let regions = match self.config.detector.strategy {
            DetectionStrategy::MarkerBoxes => {
                regions::crop_regions(&located.enhanced, &located.detections, self.config.crop.padding)
            }
            DetectionStrategy::PriceAxis => {
                regions::crop_axis_regions(decoded, &located.detections, &self.config.axis)
            }
        };
        for region in &regions {
            let file = format!("{:02}.png", region.index + 1);
            self.dump("03_regions", &file, || DynamicImage::ImageRgb8(region.crop.clone()))?;
        }
        Ok(regions)
    }
}

/// Screenshot in, trade plan out.
///
/// ```no_run
/// # async fn demo() -> anyhow::Result<()> {
/// use chartlevels::{ChartPipeline, OcrsEngine};
///
/// let bytes = std::fs::read("chart.png")?;
/// let pipeline = ChartPipeline::new(OcrsEngine::from_cache_dir()?);
/// let levels = pipeline.run(&bytes).await?;
/// println!("{:?} stop={:?}", levels.direction, levels.stop);
/// # Ok(())
/// # }
/// ```
pub struct ChartPipeline<E> {
    engine: E,
    detector: ChartDetector,
    parser: NumberParser,
}

impl<E: OcrEngine> ChartPipeline<E> {
    pub fn new(engine: E) -> Self {
        let detector = ChartDetector::new();
        let parser = NumberParser::new(&detector.config.numbers);
        Self {
            engine,
            detector,
            parser,
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Result<Self> {
        self.parser = NumberParser::new(&config.numbers);
        self.detector = self.detector.with_config(config)?;
        Ok(self)
    }

    /// Dump intermediate images. The directory must be empty or absent.
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        self.detector = self.detector.with_debug(output_dir)?;
        Ok(self)
    }

    pub fn config(&self) -> &PipelineConfig {
        self.detector.config()
    }

    pub fn detector(&self) -> &ChartDetector {
        &self.detector
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Decode and process an encoded screenshot.
    pub async fn run(&self, bytes: &[u8]) -> Result<ParsedLevels> {
        self.with_timeout(async {
            let decoded = preprocessing::decode(bytes)?;
            self.process(decoded).await
        })
        .await
    }

    /// Process an already decoded screenshot.
    pub async fn run_image(&self, decoded: RgbImage) -> Result<ParsedLevels> {
        self.with_timeout(self.process(decoded)).await
    }

    /// Like [`run`](Self::run), but gives up with [`Error::Cancelled`] as soon
    /// as `signal` completes.
    pub async fn run_until_cancelled<F>(&self, bytes: &[u8], signal: F) -> Result<ParsedLevels>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = signal => {
                tracing::info!("pipeline run cancelled");
                Err(Error::Cancelled)
            }
            result = self.run(bytes) => result,
        }
    }

    /// [`run`](Self::run), normalized to the order-ticket shape.
    pub async fn extract_trade_levels(&self, bytes: &[u8]) -> Result<ExtractedTradeLevels> {
        Ok(self.run(bytes).await?.into())
    }

    async fn with_timeout<F>(&self, fut: F) -> Result<ParsedLevels>
    where
        F: Future<Output = Result<ParsedLevels>>,
    {
        match self.config().timeout() {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| Error::Timeout(limit))?,
            None => fut.await,
        }
    }

    #[tracing::instrument(name = "chart_pipeline", skip_all, fields(width = decoded.width(), height = decoded.height()))]
    async fn process(&self, decoded: RgbImage) -> Result<ParsedLevels> {
        let located = self.detector.locate(&decoded)?;
        let regions = self.detector.crop(&decoded, &located)?;
        drop(located);
        drop(decoded);

        let results = self.recognize(regions).await;
        let config = self.config();
        let levels = assemble_levels(
            &results,
            &self.parser,
            config.detector.strategy,
            config.numbers.max_targets,
        );

        tracing::info!(
            direction = ?levels.direction,
            entry = ?levels.entry,
            stop = ?levels.stop,
            targets = ?levels.targets,
            "extracted trade levels"
        );
        Ok(levels)
    }

    /// OCR every region with at most `ocr.concurrency` in flight. Output keeps
    /// region order regardless of completion order.
    async fn recognize(&self, regions: Vec<Region>) -> Vec<OcrResult> {
        let ocr = &self.config().ocr;
        // Futures are built up front (they stay lazy) so no closure type is
        // held across the await; this keeps the future `Send` for generic `E`.
        let reads: Vec<_> = regions
            .iter()
            .map(|region| async move {
                let text = detection::ocr::read_region(&self.engine, region, ocr).await;
                (region.index, text)
            })
            .collect();
        let mut texts: HashMap<usize, String> = stream::iter(reads)
            .buffer_unordered(ocr.concurrency.max(1))
            .collect()
            .await;

        regions
            .into_iter()
            .map(|region| OcrResult {
                raw_text: texts.remove(&region.index).unwrap_or_default(),
                detection: region.detection,
            })
            .collect()
    }
}
