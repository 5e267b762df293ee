//! HSV color model and binary mask arithmetic.
//!
//! Hue is stored in half-degrees (0..=180) and saturation/value in 0..=255 so
//! that palette ranges match the numbers charting tools and OpenCV report.

use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use imageproc::map::{map_colors, map_colors2};
use serde::{Deserialize, Serialize};

use crate::models::Roi;

/// Three channels per pixel: `[hue, saturation, value]`.
pub type HsvImage = ImageBuffer<Rgb<u8>, Vec<u8>>;

pub const MASK_ON: u8 = 255;

/// Inclusive HSV box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|c| self.lower[c] <= hsv[c] && hsv[c] <= self.upper[c])
    }
}

pub fn rgb_to_hsv_pixel([r, g, b]: [u8; 3]) -> [u8; 3] {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let diff = max - min;

    let s = if max > 0.0 { 255.0 * diff / max } else { 0.0 };
    let mut h = if diff == 0.0 {
        0.0
    } else if max == rf {
        60.0 * (gf - bf) / diff
    } else if max == gf {
        120.0 + 60.0 * (bf - rf) / diff
    } else {
        240.0 + 60.0 * (rf - gf) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }

    [
        (h / 2.0).round().min(180.0) as u8,
        s.round() as u8,
        max as u8,
    ]
}

pub fn to_hsv(img: &RgbImage) -> HsvImage {
    map_colors(img, |p: Rgb<u8>| Rgb(rgb_to_hsv_pixel(p.0)))
}

/// 255 where the pixel lies inside `range`, 0 elsewhere.
pub fn in_range(hsv: &HsvImage, range: &HsvRange) -> GrayImage {
    map_colors(hsv, |p: Rgb<u8>| Luma([if range.contains(p.0) { MASK_ON } else { 0 }]))
}

/// `sat(a * wa + b * wb)`, rounded. Both masks must have the same size.
pub fn add_weighted(a: &GrayImage, wa: f32, b: &GrayImage, wb: f32) -> GrayImage {
    map_colors2(a, b, |pa: Luma<u8>, pb: Luma<u8>| {
        let v = pa[0] as f32 * wa + pb[0] as f32 * wb;
        Luma([v.round().clamp(0.0, 255.0) as u8])
    })
}

pub fn saturating_add(a: &GrayImage, b: &GrayImage) -> GrayImage {
    add_weighted(a, 1.0, b, 1.0)
}

pub fn bitwise_and(a: &GrayImage, b: &GrayImage) -> GrayImage {
    map_colors2(a, b, |pa: Luma<u8>, pb: Luma<u8>| Luma([pa[0] & pb[0]]))
}

pub fn count_nonzero(mask: &GrayImage, roi: &Roi) -> u32 {
    let mut count = 0;
    for y in roi.y..roi.y + roi.height {
        for x in roi.x..roi.x + roi.width {
            if mask.get_pixel(x, y)[0] != 0 {
                count += 1;
            }
        }
    }
    count
}

pub fn mean_hue(hsv: &HsvImage, roi: &Roi) -> f32 {
    let mut sum: u64 = 0;
    for y in roi.y..roi.y + roi.height {
        for x in roi.x..roi.x + roi.width {
            sum += hsv.get_pixel(x, y)[0] as u64;
        }
    }
    match roi.area() {
        0 => 0.0,
        area => sum as f32 / area as f32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_hues_use_half_degrees() {
        assert_eq!(rgb_to_hsv_pixel([255, 0, 0]), [0, 255, 255]);
        assert_eq!(rgb_to_hsv_pixel([0, 255, 0]), [60, 255, 255]);
        assert_eq!(rgb_to_hsv_pixel([0, 0, 255]), [120, 255, 255]);
        assert_eq!(rgb_to_hsv_pixel([255, 255, 255]), [0, 0, 255]);
        assert_eq!(rgb_to_hsv_pixel([0, 0, 0]), [0, 0, 0]);
    }

    #[test]
    fn magenta_wraps_to_upper_red_band() {
        let [h, _, _] = rgb_to_hsv_pixel([255, 0, 40]);
        assert!(h >= 170, "hue {h} should sit above 170");
    }

    #[test]
    fn weighted_sum_saturates() {
        let a = GrayImage::from_pixel(2, 1, Luma([255]));
        let b = GrayImage::from_pixel(2, 1, Luma([255]));
        assert_eq!(add_weighted(&a, 1.0, &b, 0.6).get_pixel(0, 0)[0], 255);

        let zero = GrayImage::new(2, 1);
        assert_eq!(add_weighted(&zero, 1.0, &b, 0.6).get_pixel(1, 0)[0], 153);
    }

    #[test]
    fn and_keeps_only_shared_bits() {
        let mut a = GrayImage::new(3, 1);
        let mut b = GrayImage::new(3, 1);
        a.put_pixel(0, 0, Luma([MASK_ON]));
        a.put_pixel(1, 0, Luma([MASK_ON]));
        b.put_pixel(1, 0, Luma([MASK_ON]));
        b.put_pixel(2, 0, Luma([0b1010_1010]));

        let both = bitwise_and(&a, &b);
        assert_eq!(both.as_raw(), &vec![0, MASK_ON, 0]);

        a.put_pixel(2, 0, Luma([0b1100_1100]));
        assert_eq!(bitwise_and(&a, &b).get_pixel(2, 0)[0], 0b1000_1000);
    }

    #[test]
    fn hsv_conversion_maps_every_pixel() {
        let mut img = RgbImage::from_pixel(2, 2, Rgb([0, 255, 0]));
        img.put_pixel(1, 1, Rgb([0, 0, 255]));
        let hsv = to_hsv(&img);
        assert_eq!(hsv.dimensions(), (2, 2));
        assert_eq!(hsv.get_pixel(0, 0).0, [60, 255, 255]);
        assert_eq!(hsv.get_pixel(1, 1).0, [120, 255, 255]);

        let blue = in_range(&hsv, &HsvRange::new([110, 100, 100], [130, 255, 255]));
        assert_eq!(blue.as_raw(), &vec![0, 0, 0, MASK_ON]);
    }

    #[test]
    fn range_is_inclusive() {
        let range = HsvRange::new([10, 10, 10], [20, 20, 20]);
        assert!(range.contains([10, 20, 15]));
        assert!(!range.contains([21, 15, 15]));
    }
}
