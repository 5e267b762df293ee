use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};

use crate::config::PreprocessConfig;
use crate::error::{Error, Result};

/// Decode PNG/JPEG/... bytes into an RGB buffer.
pub fn decode(bytes: &[u8]) -> Result<RgbImage> {
    let img = image::load_from_memory(bytes).map_err(Error::ImageDecode)?;
    Ok(img.to_rgb8())
}

/// Smooth compression noise, then boost local contrast on luminance only.
pub fn enhance(img: &RgbImage, config: &PreprocessConfig) -> RgbImage {
    let blurred = bilateral_filter(
        img,
        config.bilateral_diameter,
        config.sigma_color,
        config.sigma_space,
    );
    let mut lab = LabImage::from_rgb(&blurred);
    lab.l = clahe(&lab.l, config.clahe_clip_limit, config.clahe_tiles);
    lab.to_rgb()
}

/// Edge-preserving blur over a disc of `diameter / 2` pixels.
///
/// Color distance is the L1 distance across the three channels.
pub fn bilateral_filter(img: &RgbImage, diameter: u32, sigma_color: f32, sigma_space: f32) -> RgbImage {
    let radius = (diameter / 2).max(1) as i32;
    let (width, height) = img.dimensions();

    let space_coeff = -0.5 / (sigma_space * sigma_space);
    let mut offsets = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let r2 = (dx * dx + dy * dy) as f32;
            if r2 <= (radius * radius) as f32 {
                offsets.push((dx, dy, (r2 * space_coeff).exp()));
            }
        }
    }

    let color_coeff = -0.5 / (sigma_color * sigma_color);
    let color_weight: Vec<f32> = (0..=255 * 3)
        .map(|d| ((d * d) as f32 * color_coeff).exp())
        .collect();

    ImageBuffer::from_fn(width, height, |x, y| {
        let center = img.get_pixel(x, y).0;
        let mut sum = [0f32; 3];
        let mut norm = 0f32;
        for &(dx, dy, ws) in &offsets {
            let sx = (x as i32 + dx).clamp(0, width as i32 - 1) as u32;
            let sy = (y as i32 + dy).clamp(0, height as i32 - 1) as u32;
            let p = img.get_pixel(sx, sy).0;
            let dist: usize = (0..3).map(|c| p[c].abs_diff(center[c]) as usize).sum();
            let w = ws * color_weight[dist];
            for c in 0..3 {
                sum[c] += p[c] as f32 * w;
            }
            norm += w;
        }
        Rgb(sum.map(|s| (s / norm).round().clamp(0.0, 255.0) as u8))
    })
}

/// CIE Lab planes. `l` is scaled to 0..=255; `a` and `b` stay unquantized.
pub struct LabImage {
    pub l: GrayImage,
    pub a: Vec<f32>,
    pub b: Vec<f32>,
}

const XN: f32 = 0.950456;
const ZN: f32 = 1.088754;

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 { c / 12.92 } else { ((c + 0.055) / 1.055).powf(2.4) }
}

fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 { 12.92 * c } else { 1.055 * c.powf(1.0 / 2.4) - 0.055 }
}

fn lab_f(t: f32) -> f32 {
    if t > 0.008856 { t.cbrt() } else { 7.787 * t + 16.0 / 116.0 }
}

fn lab_f_inv(t: f32) -> f32 {
    if t > 0.206_893 { t * t * t } else { (t - 16.0 / 116.0) / 7.787 }
}

pub fn rgb_to_lab([r, g, b]: [u8; 3]) -> [f32; 3] {
    let r = srgb_to_linear(r as f32 / 255.0);
    let g = srgb_to_linear(g as f32 / 255.0);
    let b = srgb_to_linear(b as f32 / 255.0);

    let x = (0.412453 * r + 0.357580 * g + 0.180423 * b) / XN;
    let y = 0.212671 * r + 0.715160 * g + 0.072169 * b;
    let z = (0.019334 * r + 0.119193 * g + 0.950227 * b) / ZN;

    let (fx, fy, fz) = (lab_f(x), lab_f(y), lab_f(z));
    [116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}

pub fn lab_to_rgb([l, a, b]: [f32; 3]) -> [u8; 3] {
    let fy = (l + 16.0) / 116.0;
    let x = lab_f_inv(fy + a / 500.0) * XN;
    let y = lab_f_inv(fy);
    let z = lab_f_inv(fy - b / 200.0) * ZN;

    let r = 3.240479 * x - 1.537150 * y - 0.498535 * z;
    let g = -0.969256 * x + 1.875992 * y + 0.041556 * z;
    let b = 0.055648 * x - 0.204043 * y + 1.057311 * z;

    [r, g, b].map(|c| (linear_to_srgb(c.clamp(0.0, 1.0)) * 255.0).round().clamp(0.0, 255.0) as u8)
}

impl LabImage {
    pub fn from_rgb(img: &RgbImage) -> Self {
        let (width, height) = img.dimensions();
        let mut l = GrayImage::new(width, height);
        let mut a = Vec::with_capacity((width * height) as usize);
        let mut b = Vec::with_capacity((width * height) as usize);
        for (x, y, px) in img.enumerate_pixels() {
            let [lv, av, bv] = rgb_to_lab(px.0);
            l.put_pixel(x, y, Luma([(lv * 255.0 / 100.0).round().clamp(0.0, 255.0) as u8]));
            a.push(av);
            b.push(bv);
        }
        Self { l, a, b }
    }

    pub fn to_rgb(&self) -> RgbImage {
        let width = self.l.width();
        ImageBuffer::from_fn(width, self.l.height(), |x, y| {
            let i = (y * width + x) as usize;
            let l = self.l.get_pixel(x, y)[0] as f32 * 100.0 / 255.0;
            Rgb(lab_to_rgb([l, self.a[i], self.b[i]]))
        })
    }
}

/// Contrast-limited adaptive histogram equalization.
///
/// Each of the `tiles x tiles` tiles gets its own clipped, equalized lookup
/// table; pixels blend the four nearest tables bilinearly.
pub fn clahe(img: &GrayImage, clip_limit: f32, tiles: u32) -> GrayImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return img.clone();
    }

    let tile_w = width.div_ceil(tiles.clamp(1, width));
    let tile_h = height.div_ceil(tiles.clamp(1, height));
    let tiles_x = width.div_ceil(tile_w);
    let tiles_y = height.div_ceil(tile_h);

    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);
            luts.push(tile_lut(img, x0, y0, x1, y1, clip_limit));
        }
    }

    let lut_at = |tx: u32, ty: u32| &luts[(ty * tiles_x + tx) as usize];

    ImageBuffer::from_fn(width, height, |x, y| {
        let v = img.get_pixel(x, y)[0] as usize;

        let gx = ((x as f32 + 0.5) / tile_w as f32 - 0.5).max(0.0);
        let gy = ((y as f32 + 0.5) / tile_h as f32 - 0.5).max(0.0);
        let tx0 = (gx.floor() as u32).min(tiles_x - 1);
        let ty0 = (gy.floor() as u32).min(tiles_y - 1);
        let tx1 = (tx0 + 1).min(tiles_x - 1);
        let ty1 = (ty0 + 1).min(tiles_y - 1);
        let wx = (gx - tx0 as f32).clamp(0.0, 1.0);
        let wy = (gy - ty0 as f32).clamp(0.0, 1.0);

        let top = lut_at(tx0, ty0)[v] * (1.0 - wx) + lut_at(tx1, ty0)[v] * wx;
        let bottom = lut_at(tx0, ty1)[v] * (1.0 - wx) + lut_at(tx1, ty1)[v] * wx;
        Luma([(top * (1.0 - wy) + bottom * wy).round().clamp(0.0, 255.0) as u8])
    })
}

fn tile_lut(img: &GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, clip_limit: f32) -> [f32; 256] {
    let mut hist = [0u32; 256];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[img.get_pixel(x, y)[0] as usize] += 1;
        }
    }
    let area = (x1 - x0) * (y1 - y0);

    if clip_limit > 0.0 {
        let limit = ((clip_limit * area as f32 / 256.0) as u32).max(1);
        let mut excess = 0;
        for bin in hist.iter_mut() {
            if *bin > limit {
                excess += *bin - limit;
                *bin = limit;
            }
        }
        let share = excess / 256;
        for bin in hist.iter_mut() {
            *bin += share;
        }
        let remainder = (excess % 256) as usize;
        if remainder > 0 {
            let step = (256 / remainder).max(1);
            for i in (0..256).step_by(step).take(remainder) {
                hist[i] += 1;
            }
        }
    }

    let scale = 255.0 / area.max(1) as f32;
    let mut lut = [0f32; 256];
    let mut cdf = 0;
    for (i, count) in hist.iter().enumerate() {
        cdf += count;
        lut[i] = cdf as f32 * scale;
    }
    lut
}
