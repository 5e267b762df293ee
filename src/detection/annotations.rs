//! Marker-box annotation detector.
//!
//! Position tools draw their zones as translucent green/red/neutral fills
//! with a blue outline. Only colored pixels touching that outline survive
//! into the annotation mask, which keeps candles of the same hue out.

use image::GrayImage;

use crate::config::DetectorConfig;
use crate::detection::color::{self, HsvImage};
use crate::detection::contours;
use crate::models::{HueLabel, RectangleDetection, Roi};

/// Combined color mask gated by the dilated marker mask, closed.
pub fn annotation_mask(hsv: &HsvImage, marker: &GrayImage, config: &DetectorConfig) -> GrayImage {
    let palette = &config.palette;
    let green = color::in_range(hsv, &palette.green);
    let red = color::saturating_add(
        &color::in_range(hsv, &palette.red_low),
        &color::in_range(hsv, &palette.red_high),
    );
    let neutral = color::in_range(hsv, &palette.neutral);

    let combined = color::saturating_add(&green, &red);
    let combined = color::add_weighted(&combined, 1.0, &neutral, config.neutral_weight);

    let gate = contours::dilate_mask(marker, config.marker_dilate_radius);
    let gated = color::bitwise_and(&combined, &gate);

    contours::close_mask(&gated, config.close_radius)
}

pub fn classify_hue(mean_hue: f32, config: &DetectorConfig) -> HueLabel {
    let (green_lo, green_hi) = config.green_hue_band;
    let (red_below, red_above) = config.red_hue_limits;
    if mean_hue < red_below || mean_hue > red_above {
        HueLabel::Red
    } else if mean_hue > green_lo && mean_hue < green_hi {
        HueLabel::Green
    } else {
        HueLabel::Neutral
    }
}

/// Geometry filters plus marker coverage. Returns the coverage when the box
/// is kept.
fn accept(roi: &Roi, marker: &GrayImage, config: &DetectorConfig) -> Option<f32> {
    let area = roi.area();
    if area < config.min_area {
        return None;
    }
    let aspect = roi.aspect_ratio();
    if aspect > config.max_aspect || aspect < config.min_aspect {
        return None;
    }
    let score = color::count_nonzero(marker, roi) as f32 / area as f32;
    (score >= config.min_mask_score).then_some(score)
}

/// Every box traced from `mask` that survives the filters, in contour scan
/// order. Overlapping or repeated boxes are kept as-is.
pub(crate) fn detections_from_mask(
    hsv: &HsvImage,
    marker: &GrayImage,
    mask: &GrayImage,
    config: &DetectorConfig,
) -> Vec<RectangleDetection> {
    let edges = contours::mask_edges(mask);
    let candidates = contours::external_boxes(&edges);
    tracing::debug!(candidates = candidates.len(), "traced annotation contours");

    let mut detections = Vec::new();
    for roi in candidates {
        let Some(score) = accept(&roi, marker, config) else {
            tracing::trace!(?roi, "rejected candidate box");
            continue;
        };
        let hue = color::mean_hue(hsv, &roi);
        let label = classify_hue(hue, config);
        tracing::debug!(?roi, score, hue, ?label, "annotation box");
        detections.push(RectangleDetection::new(roi, score, label));
    }
    detections
}
