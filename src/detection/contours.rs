use image::{GrayImage, Luma};
use imageproc::contours::{BorderType, find_contours};
use imageproc::distance_transform::Norm;
use imageproc::map::{map_colors, map_colors2};
use imageproc::morphology::{close, dilate, erode};

use crate::detection::color::MASK_ON;
use crate::models::Roi;

/// Any non-zero pixel becomes 255.
pub fn binarize(mask: &GrayImage) -> GrayImage {
    map_colors(mask, |p: Luma<u8>| Luma([if p[0] != 0 { MASK_ON } else { 0 }]))
}

/// Dilate-then-erode with a `(2r+1) x (2r+1)` square.
pub fn close_mask(mask: &GrayImage, radius: u8) -> GrayImage {
    if radius == 0 {
        return binarize(mask);
    }
    close(&binarize(mask), Norm::LInf, radius)
}

pub fn dilate_mask(mask: &GrayImage, radius: u8) -> GrayImage {
    if radius == 0 {
        return binarize(mask);
    }
    dilate(&binarize(mask), Norm::LInf, radius)
}

/// Morphological gradient: pixels within one step of a mask border.
pub fn mask_edges(mask: &GrayImage) -> GrayImage {
    let mask = binarize(mask);
    let grown = dilate(&mask, Norm::LInf, 1);
    let shrunk = erode(&mask, Norm::LInf, 1);
    map_colors2(&grown, &shrunk, |g: Luma<u8>, s: Luma<u8>| {
        Luma([if g[0] != 0 && s[0] == 0 { MASK_ON } else { 0 }])
    })
}

/// Bounding boxes of outermost borders, in raster scan order.
///
/// Borders nested inside another shape (holes and anything within them) are
/// skipped.
pub fn external_boxes(edges: &GrayImage) -> Vec<Roi> {
    find_contours::<u32>(edges)
        .into_iter()
        .filter(|c| c.parent.is_none() && matches!(c.border_type, BorderType::Outer))
        .filter_map(|c| {
            let first = c.points.first()?;
            let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
            for p in &c.points {
                min_x = min_x.min(p.x);
                min_y = min_y.min(p.y);
                max_x = max_x.max(p.x);
                max_y = max_y.max(p.y);
            }
            Some(Roi::from_corners(min_x, min_y, max_x, max_y))
        })
        .collect()
}
