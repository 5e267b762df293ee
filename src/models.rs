use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Axis-aligned box in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Roi {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Bounding box spanning two inclusive corners.
    pub fn from_corners(min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> Self {
        Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
        }
    }

    pub fn area(&self) -> u32 {
        self.width * self.height
    }

    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f32 / self.height as f32
    }

    pub fn center(&self) -> Center {
        Center {
            x: self.x as f32 + self.width as f32 / 2.0,
            y: self.y as f32 + self.height as f32 / 2.0,
        }
    }

    /// Clip to an image of the given size. `None` when nothing is left.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Roi> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let w = self.width.min(width - self.x);
        let h = self.height.min(height - self.y);
        (w > 0 && h > 0).then(|| Roi::new(self.x, self.y, w, h))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Center {
    pub x: f32,
    pub y: f32,
}

/// Coarse color class of an annotation box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HueLabel {
    /// Take-profit zone.
    Green,
    /// Stop-loss zone.
    Red,
    /// Entry zone.
    Neutral,
}

/// One candidate annotation box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectangleDetection {
    pub roi: Roi,
    /// Fraction of marker-colored pixels inside `roi`, in `[0, 1]`.
    pub mask_score: f32,
    pub hue_label: HueLabel,
    pub center: Center,
}

impl RectangleDetection {
    pub fn new(roi: Roi, mask_score: f32, hue_label: HueLabel) -> Self {
        Self {
            roi,
            mask_score: mask_score.clamp(0.0, 1.0),
            hue_label,
            center: roi.center(),
        }
    }
}

/// A detection together with its padded crop.
#[derive(Debug, Clone)]
pub struct Region {
    pub index: usize,
    pub detection: RectangleDetection,
    pub crop: RgbImage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrResult {
    pub detection: RectangleDetection,
    pub raw_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn as_lowercase(&self) -> &'static str {
        match self {
            Direction::Long => "long",
            Direction::Short => "short",
        }
    }
}

/// Trade plan read from one screenshot.
///
/// `targets` is ordered best first and holds at most three values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedLevels {
    pub direction: Direction,
    pub entry: Option<f64>,
    pub stop: Option<f64>,
    pub targets: Vec<f64>,
}

/// Shape handed to the order ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedTradeLevels {
    pub direction: String,
    pub entries: Vec<f64>,
    pub stop_loss: Option<f64>,
    pub take_profits: Vec<f64>,
}

impl From<ParsedLevels> for ExtractedTradeLevels {
    fn from(parsed: ParsedLevels) -> Self {
        Self {
            direction: parsed.direction.as_lowercase().to_string(),
            entries: parsed.entry.into_iter().collect(),
            stop_loss: parsed.stop,
            take_profits: parsed.targets,
        }
    }
}
