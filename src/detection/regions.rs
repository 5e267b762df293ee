use image::RgbImage;

use crate::config::AxisConfig;
use crate::detection::axis;
use crate::models::{Region, RectangleDetection};

/// Pixel bounds `[x0, x1) x [y0, y1)` of a detection grown by `padding`.
///
/// The box border itself is one pixel thick, so the grown area starts just
/// inside it before padding is applied.
pub fn padded_bounds(
    detection: &RectangleDetection,
    padding: u32,
    width: u32,
    height: u32,
) -> Option<(u32, u32, u32, u32)> {
    let roi = &detection.roi;
    let p = padding as i64;
    let x0 = (roi.x as i64 + 1 - p).max(0);
    let y0 = (roi.y as i64 + 1 - p).max(0);
    let x1 = (roi.x as i64 + roi.width as i64 - 1 + p).min(width as i64);
    let y1 = (roi.y as i64 + roi.height as i64 - 1 + p).min(height as i64);
    (x1 > x0 && y1 > y0).then_some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
}

/// Pixel bounds of a price-axis label crop.
///
/// The label is padded by `crop_pad_x`/`crop_pad_y`, kept right of
/// `start_x`, then grown to at least `min_crop` per side where the image
/// allows it.
pub fn axis_bounds(
    detection: &RectangleDetection,
    config: &AxisConfig,
    start_x: u32,
    width: u32,
    height: u32,
) -> Option<(u32, u32, u32, u32)> {
    let roi = &detection.roi;
    let (w, h) = (width as i64, height as i64);
    let (pad_x, pad_y) = (config.crop_pad_x as i64, config.crop_pad_y as i64);
    let min_crop = config.min_crop as i64;

    let max_x = roi.x as i64 + roi.width as i64 - 1;
    let max_y = roi.y as i64 + roi.height as i64 - 1;
    let x0 = (roi.x as i64 - pad_x).max(start_x as i64);
    let y0 = (roi.y as i64 - pad_y).max(0);
    let x1 = (max_x + pad_x).min(w);
    let y1 = (max_y + pad_y).min(h);

    let x1 = (x0 + (x1 - x0).max(min_crop)).min(w);
    let y1 = (y0 + (y1 - y0).max(min_crop)).min(h);
    (x1 > x0 && y1 > y0).then_some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
}

fn crop_with<F>(img: &RgbImage, detections: &[RectangleDetection], bounds: F) -> Vec<Region>
where
    F: Fn(&RectangleDetection) -> Option<(u32, u32, u32, u32)>,
{
    let mut regions = Vec::with_capacity(detections.len());

    for (index, detection) in detections.iter().enumerate() {
        let Some((x0, y0, x1, y1)) = bounds(detection) else {
            tracing::warn!(index, roi = ?detection.roi, "skipping empty crop");
            continue;
        };
        let crop = image::imageops::crop_imm(img, x0, y0, x1 - x0, y1 - y0).to_image();
        regions.push(Region {
            index,
            detection: detection.clone(),
            crop,
        });
    }
    regions
}

/// Owned, padded crops for every detection. Indices follow the input order;
/// empty crops are skipped.
pub fn crop_regions(img: &RgbImage, detections: &[RectangleDetection], padding: u32) -> Vec<Region> {
    let (width, height) = img.dimensions();
    crop_with(img, detections, |d| padded_bounds(d, padding, width, height))
}

/// Crops for price-axis labels, cut with [`axis_bounds`].
pub fn crop_axis_regions(img: &RgbImage, detections: &[RectangleDetection], config: &AxisConfig) -> Vec<Region> {
    let (width, height) = img.dimensions();
    let start_x = axis::column_start(width, config);
    crop_with(img, detections, |d| axis_bounds(d, config, start_x, width, height))
}
