#![allow(dead_code)]

mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from chartlevels for tests
pub use chartlevels::{
    ChartPipeline, DetectionStrategy, Direction, Error, ExtractedTradeLevels, HueLabel, OcrEngine,
    ParsedLevels, PipelineConfig, RecognizeOptions, RecognizedText,
};
