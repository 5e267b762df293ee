//! Read trade levels (entry, stop, take-profits) off annotated chart
//! screenshots.

pub mod config;
pub mod detection;
pub mod error;
pub mod levels;
pub mod logging;
pub mod models;
pub mod pipeline;

pub use config::{DetectionStrategy, PipelineConfig};
pub use detection::{OcrEngine, OcrsEngine, RecognizeOptions, RecognizedText, pick_longer_ocr_result};
pub use error::{Error, Result};
pub use models::{
    Direction, ExtractedTradeLevels, HueLabel, OcrResult, ParsedLevels, RectangleDetection, Roi,
};
pub use pipeline::{ChartDetector, ChartPipeline, DebugConfig};
