use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chartlevels::{HueLabel, OcrEngine, RecognizeOptions, RecognizedText};
use image::{Rgb, RgbImage};

/// Colors of the position tool the detector is tuned for.
pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const MARKER_BLUE: Rgb<u8> = Rgb([30, 80, 220]);
pub const TP_GREEN: Rgb<u8> = Rgb([40, 170, 90]);
pub const SL_RED: Rgb<u8> = Rgb([200, 50, 50]);
pub const ENTRY_NEUTRAL: Rgb<u8> = Rgb([190, 178, 150]);

/// Price-axis label colors on a dark theme.
pub const AXIS_BACKGROUND: Rgb<u8> = Rgb([19, 23, 34]);
pub const AXIS_TP: Rgb<u8> = Rgb([76, 175, 80]);
pub const AXIS_SL: Rgb<u8> = Rgb([239, 83, 80]);
pub const AXIS_ENTRY: Rgb<u8> = Rgb([128, 128, 128]);

/// Zone boxes are 160x40 and sit at x = 100.
pub const ZONE_X: u32 = 100;
pub const ZONE_W: u32 = 160;
pub const ZONE_H: u32 = 40;

/// Paints synthetic chart screenshots.
pub struct ChartBuilder {
    img: RgbImage,
}

impl ChartBuilder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            img: RgbImage::from_pixel(width, height, WHITE),
        }
    }

    pub fn dark(width: u32, height: u32) -> Self {
        Self {
            img: RgbImage::from_pixel(width, height, AXIS_BACKGROUND),
        }
    }

    /// Filled zone with a one pixel marker outline.
    pub fn zone(mut self, y: u32, fill: Rgb<u8>) -> Self {
        for yy in y..y + ZONE_H {
            for xx in ZONE_X..ZONE_X + ZONE_W {
                let edge = xx == ZONE_X || yy == y || xx == ZONE_X + ZONE_W - 1 || yy == y + ZONE_H - 1;
                self.img.put_pixel(xx, yy, if edge { MARKER_BLUE } else { fill });
            }
        }
        self
    }

    /// Solid label in the right-hand price column.
    pub fn axis_label(mut self, y0: u32, y1: u32, color: Rgb<u8>) -> Self {
        let width = self.img.width();
        for y in y0..y1 {
            for x in width - 120..width - 10 {
                self.img.put_pixel(x, y, color);
            }
        }
        self
    }

    pub fn image(self) -> RgbImage {
        self.img
    }

    pub fn png(self) -> Vec<u8> {
        encode_png(&self.img)
    }
}

pub fn encode_png(img: &RgbImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("Failed to encode test image");
    bytes
}

/// Green take-profit above neutral entry above red stop.
pub fn long_chart() -> Vec<u8> {
    ChartBuilder::new(400, 260)
        .zone(40, TP_GREEN)
        .zone(100, ENTRY_NEUTRAL)
        .zone(160, SL_RED)
        .png()
}

/// Chart with the price labels of [`long_chart`] in the axis column.
pub fn axis_chart() -> Vec<u8> {
    ChartBuilder::dark(800, 400)
        .axis_label(40, 64, AXIS_TP)
        .axis_label(180, 204, AXIS_ENTRY)
        .axis_label(320, 344, AXIS_SL)
        .png()
}

/// Coarse color of the crop center, where the zone fill is.
pub fn crop_label(image: &RgbImage) -> HueLabel {
    let [r, g, _] = image.get_pixel(image.width() / 2, image.height() / 2).0;
    let (r, g) = (r as i32, g as i32);
    if g > r + 40 {
        HueLabel::Green
    } else if r > g + 80 {
        HueLabel::Red
    } else {
        HueLabel::Neutral
    }
}

/// Scripted OCR: answers by the color of the crop it is shown.
///
/// The digits pass returns the text with everything but the whitelist
/// stripped, like a real engine would.
pub struct FakeOcr {
    pub take_profit: String,
    pub stop_loss: String,
    pub entry: String,
    /// Green crops answer last when set.
    pub stagger: bool,
    calls: AtomicUsize,
}

impl FakeOcr {
    pub fn new(take_profit: &str, entry: &str, stop_loss: &str) -> Self {
        Self {
            take_profit: take_profit.to_string(),
            stop_loss: stop_loss.to_string(),
            entry: entry.to_string(),
            stagger: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// The texts of the end-to-end scenario.
    pub fn scenario() -> Self {
        Self::new("62,500 / 63,000", "61,000.00", "59,800")
    }

    pub fn staggered(mut self) -> Self {
        self.stagger = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OcrEngine for FakeOcr {
    async fn recognize(
        &self,
        image: &RgbImage,
        _language: &str,
        options: &RecognizeOptions,
    ) -> anyhow::Result<RecognizedText> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let label = crop_label(image);
        if self.stagger {
            let delay = match label {
                HueLabel::Green => 60,
                HueLabel::Neutral => 30,
                HueLabel::Red => 0,
            };
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let text = match label {
            HueLabel::Green => &self.take_profit,
            HueLabel::Red => &self.stop_loss,
            HueLabel::Neutral => &self.entry,
        };
        let text = match &options.char_whitelist {
            Some(allowed) => text.chars().filter(|c| allowed.contains(*c)).collect(),
            None => text.clone(),
        };
        Ok(RecognizedText { text })
    }
}

/// Engine whose every call fails.
pub struct BrokenOcr;

impl OcrEngine for BrokenOcr {
    async fn recognize(
        &self,
        _image: &RgbImage,
        _language: &str,
        _options: &RecognizeOptions,
    ) -> anyhow::Result<RecognizedText> {
        anyhow::bail!("recognizer process crashed")
    }
}

/// Engine that never answers in time.
pub struct StalledOcr;

impl OcrEngine for StalledOcr {
    async fn recognize(
        &self,
        _image: &RgbImage,
        _language: &str,
        _options: &RecognizeOptions,
    ) -> anyhow::Result<RecognizedText> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(RecognizedText::default())
    }
}
