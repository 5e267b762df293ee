use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by the chart pipeline.
///
/// Only `ImageDecode`, `AnnotationNotFound`, `Cancelled` and `Timeout` abort a
/// run. `OcrEngine` is reported per region and degraded to empty text.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to decode image: {0}")]
    ImageDecode(#[source] image::ImageError),

    #[error("unable to locate trade annotations")]
    AnnotationNotFound,

    #[error("OCR engine failed on region {region}: {source}")]
    OcrEngine {
        region: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("pipeline run was cancelled")]
    Cancelled,

    #[error("pipeline run exceeded {0:?}")]
    Timeout(Duration),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to write debug output {}: {source}", path.display())]
    DebugOutput {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}
