pub mod annotations;
pub mod axis;
pub mod color;
pub mod contours;
pub mod ocr;
pub mod preprocessing;
pub mod regions;

use image::{GrayImage, RgbImage};

use crate::config::{DetectionStrategy, PipelineConfig};
use crate::error::{Error, Result};
use crate::models::RectangleDetection;

pub use ocr::{OcrEngine, OcrsEngine, RecognizeOptions, RecognizedText, pick_longer_ocr_result};

/// Boxes found by one detector, plus the mask they were traced from.
#[derive(Debug, Clone)]
pub struct Detections {
    pub boxes: Vec<RectangleDetection>,
    /// Only the marker-box detector produces a mask.
    pub mask: Option<GrayImage>,
}

/// Run the configured detector.
///
/// Marker boxes are traced on the enhanced image. Price-axis labels are read
/// from the decoded image, since CLAHE shifts their flat colors.
pub fn detect_annotations(
    decoded: &RgbImage,
    enhanced: &RgbImage,
    config: &PipelineConfig,
) -> Result<Detections> {
    let detections = match config.detector.strategy {
        DetectionStrategy::MarkerBoxes => {
            let hsv = color::to_hsv(enhanced);
            let marker = color::in_range(&hsv, &config.detector.palette.marker);
            let mask = annotations::annotation_mask(&hsv, &marker, &config.detector);
            let boxes = annotations::detections_from_mask(&hsv, &marker, &mask, &config.detector);
            Detections {
                boxes,
                mask: Some(mask),
            }
        }
        DetectionStrategy::PriceAxis => Detections {
            boxes: axis::detect_axis_labels(decoded, &config.axis)?,
            mask: None,
        },
    };

    if detections.boxes.is_empty() {
        return Err(Error::AnnotationNotFound);
    }
    tracing::debug!(
        strategy = ?config.detector.strategy,
        count = detections.boxes.len(),
        "detected annotations"
    );
    Ok(detections)
}
