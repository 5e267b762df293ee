//! Tunable parameters for every pipeline stage.
//!
//! The defaults reproduce the palette and thresholds of the charting tool the
//! detector was tuned against. Every section is `#[serde(default)]`, so a JSON
//! file only needs to mention the values it overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::detection::color::HsvRange;
use crate::detection::ocr::PageSegMode;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub preprocess: PreprocessConfig,
    pub detector: DetectorConfig,
    pub axis: AxisConfig,
    pub crop: CropConfig,
    pub ocr: OcrConfig,
    pub numbers: NumberConfig,
    /// Abort the run after this many milliseconds.
    pub timeout_ms: Option<u64>,
}

impl PipelineConfig {
    /// Load a JSON config file and validate it.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&data)
            .map_err(|e| Error::Config(format!("cannot parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<()> {
        let n = &self.numbers;
        if !(n.min_price.is_finite() && n.max_price.is_finite()) || n.min_price > n.max_price {
            return Err(Error::Config(format!(
                "price range [{}, {}] is empty",
                n.min_price, n.max_price
            )));
        }
        if n.max_targets == 0 {
            return Err(Error::Config("max_targets must be at least 1".into()));
        }

        let d = &self.detector;
        if d.min_aspect <= 0.0 || d.min_aspect > d.max_aspect {
            return Err(Error::Config(format!(
                "aspect bounds [{}, {}] are invalid",
                d.min_aspect, d.max_aspect
            )));
        }
        if !(0.0..=1.0).contains(&d.min_mask_score) {
            return Err(Error::Config("min_mask_score must lie in [0, 1]".into()));
        }

        let p = &self.preprocess;
        if p.clahe_tiles == 0 {
            return Err(Error::Config("clahe_tiles must be at least 1".into()));
        }
        if p.sigma_color <= 0.0 || p.sigma_space <= 0.0 {
            return Err(Error::Config("bilateral sigmas must be positive".into()));
        }

        if self.ocr.concurrency == 0 {
            return Err(Error::Config("ocr.concurrency must be at least 1".into()));
        }

        let a = &self.axis;
        if !(0.0..=1.0).contains(&a.right_column_ratio) || a.sample_step == 0 {
            return Err(Error::Config("axis column ratio or sample step is invalid".into()));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Bilateral window diameter in pixels.
    pub bilateral_diameter: u32,
    pub sigma_color: f32,
    pub sigma_space: f32,
    pub clahe_clip_limit: f32,
    /// Tiles per axis for CLAHE.
    pub clahe_tiles: u32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            bilateral_diameter: 9,
            sigma_color: 75.0,
            sigma_space: 75.0,
            clahe_clip_limit: 2.0,
            clahe_tiles: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionStrategy {
    /// Colored boxes outlined in the marker hue anywhere on the chart.
    #[default]
    MarkerBoxes,
    /// Colored price labels in the right-hand price axis.
    PriceAxis,
}

/// HSV ranges use OpenCV 8-bit scaling: hue 0..=180, saturation and value 0..=255.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub green: HsvRange,
    pub red_low: HsvRange,
    pub red_high: HsvRange,
    pub neutral: HsvRange,
    pub marker: HsvRange,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            green: HsvRange::new([35, 40, 40], [95, 255, 255]),
            red_low: HsvRange::new([0, 70, 40], [10, 255, 255]),
            red_high: HsvRange::new([170, 70, 40], [180, 255, 255]),
            neutral: HsvRange::new([15, 15, 40], [35, 80, 240]),
            marker: HsvRange::new([90, 80, 80], [120, 255, 255]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub strategy: DetectionStrategy,
    pub palette: Palette,
    /// Weight of the neutral mask in the combined color mask.
    pub neutral_weight: f32,
    /// Square radius of the marker dilation (1 = 3x3).
    pub marker_dilate_radius: u8,
    /// Square radius of the closing kernel (2 = 5x5).
    pub close_radius: u8,
    pub min_area: u32,
    pub max_aspect: f32,
    pub min_aspect: f32,
    pub min_mask_score: f32,
    /// Mean hue strictly inside this band labels a box green.
    pub green_hue_band: (f32, f32),
    /// Mean hue below the first or above the second value labels a box red.
    pub red_hue_limits: (f32, f32),
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            strategy: DetectionStrategy::default(),
            palette: Palette::default(),
            neutral_weight: 0.6,
            marker_dilate_radius: 1,
            close_radius: 2,
            min_area: 600,
            max_aspect: 4.5,
            min_aspect: 0.5,
            min_mask_score: 0.005,
            green_hue_band: (30.0, 100.0),
            red_hue_limits: (20.0, 160.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisConfig {
    pub right_column_ratio: f32,
    pub min_column_width: u32,
    pub sample_step: u32,
    pub min_row_ratio: f32,
    pub min_segment_height: u32,
    pub gap_tolerance: u32,
    pub max_targets: usize,
    /// Label crops grow by this much left and right, but never past the
    /// start of the axis column.
    pub crop_pad_x: u32,
    pub crop_pad_y: u32,
    /// Smallest crop side handed to OCR.
    pub min_crop: u32,
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            right_column_ratio: 0.25,
            min_column_width: 160,
            sample_step: 2,
            min_row_ratio: 0.35,
            min_segment_height: 16,
            gap_tolerance: 2,
            max_targets: 3,
            crop_pad_x: 8,
            crop_pad_y: 6,
            min_crop: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CropConfig {
    pub padding: u32,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self { padding: 8 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub language: String,
    pub digit_whitelist: String,
    pub char_blacklist: String,
    pub page_seg_mode: PageSegMode,
    /// Regions recognized at the same time.
    pub concurrency: usize,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            digit_whitelist: "0123456789.".to_string(),
            char_blacklist: "abcdefghijklmnopqrstuvwxyz".to_string(),
            page_seg_mode: PageSegMode::SparseText,
            concurrency: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NumberConfig {
    pub min_price: f64,
    pub max_price: f64,
    /// Accept prices without a fractional part, e.g. `62,500`.
    pub allow_integers: bool,
    pub max_targets: usize,
}

impl Default for NumberConfig {
    fn default() -> Self {
        Self {
            min_price: 100.0,
            max_price: 100_000.0,
            allow_integers: true,
            max_targets: 3,
        }
    }
}
