//! Price-axis label detector.
//!
//! Charting tools repeat every position level as a colored price label in the
//! right-hand axis. This strategy scans that column row by row instead of
//! looking for outlined boxes, which is faster and works on screenshots where
//! the zones themselves are cropped away.

use image::RgbImage;

use crate::config::AxisConfig;
use crate::error::{Error, Result};
use crate::models::{HueLabel, RectangleDetection, Roi};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LabelKind {
    TakeProfit,
    StopLoss,
    Entry,
}

impl LabelKind {
    const ALL: [LabelKind; 3] = [LabelKind::TakeProfit, LabelKind::StopLoss, LabelKind::Entry];

    fn hue_label(self) -> HueLabel {
        match self {
            LabelKind::TakeProfit => HueLabel::Green,
            LabelKind::StopLoss => HueLabel::Red,
            LabelKind::Entry => HueLabel::Neutral,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Row {
    kind: Option<LabelKind>,
    min_x: u32,
    max_x: u32,
}

#[derive(Debug, Clone)]
struct Segment {
    kind: LabelKind,
    y_start: u32,
    y_end: u32,
    min_x: u32,
    max_x: u32,
    score: u64,
}

impl Segment {
    fn height(&self) -> u32 {
        self.y_end - self.y_start + 1
    }
}

/// Hue in degrees, saturation and lightness in `[0, 1]`.
fn rgb_to_hsl([r, g, b]: [u8; 3]) -> (f32, f32, f32) {
    let (r, g, b) = (r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    if max == min {
        return (0.0, 0.0, l);
    }

    let d = max - min;
    let s = if l > 0.5 { d / (2.0 - max - min) } else { d / (max + min) };
    let h = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };
    (h * 60.0, s, l)
}

fn classify_pixel(rgb: [u8; 3]) -> Option<LabelKind> {
    let (h, s, l) = rgb_to_hsl(rgb);
    if l < 0.18 {
        return None;
    }
    if s < 0.18 && (0.25..=0.8).contains(&l) {
        return Some(LabelKind::Entry);
    }
    if s > 0.25 {
        if (85.0..=155.0).contains(&h) && l <= 0.8 {
            return Some(LabelKind::TakeProfit);
        }
        if h <= 25.0 || h >= 330.0 {
            return Some(LabelKind::StopLoss);
        }
    }
    None
}

/// Left edge of the scanned price-axis column.
pub fn column_start(width: u32, config: &AxisConfig) -> u32 {
    let column = ((width as f32 * config.right_column_ratio) as u32).max(config.min_column_width);
    width.saturating_sub(column)
}

fn scan_rows(img: &RgbImage, start_x: u32, config: &AxisConfig) -> Vec<Row> {
    let (width, height) = img.dimensions();
    (0..height)
        .map(|y| {
            let mut counts = [0u32; 3];
            let mut total = 0;
            let mut min_x = width;
            let mut max_x = None;
            for x in (start_x..width).step_by(config.sample_step as usize) {
                if let Some(kind) = classify_pixel(img.get_pixel(x, y).0) {
                    counts[kind as usize] += 1;
                    total += 1;
                    min_x = min_x.min(x);
                    max_x = Some(x);
                }
            }

            let mut selected = None;
            let mut best = 0;
            for (kind, count) in LabelKind::ALL.iter().zip(counts) {
                if count > best {
                    best = count;
                    selected = Some(*kind);
                }
            }

            match (selected, max_x) {
                (Some(kind), Some(max_x)) if best as f32 / total as f32 >= config.min_row_ratio => Row {
                    kind: Some(kind),
                    min_x,
                    max_x,
                },
                _ => Row {
                    kind: None,
                    min_x: start_x,
                    max_x: width.saturating_sub(1),
                },
            }
        })
        .collect()
}

fn build_segments(rows: &[Row], config: &AxisConfig) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current: Option<Segment> = None;
    let mut gap = 0;
    let flush = |segment: Segment, segments: &mut Vec<Segment>| {
        if segment.height() >= config.min_segment_height {
            segments.push(segment);
        }
    };

    for (y, row) in rows.iter().enumerate() {
        let y = y as u32;
        let Some(kind) = row.kind else {
            if current.is_some() {
                gap += 1;
                if gap > config.gap_tolerance {
                    if let Some(done) = current.take() {
                        flush(done, &mut segments);
                    }
                    gap = 0;
                }
            }
            continue;
        };

        let width = (row.max_x - row.min_x) as u64;
        match current.take() {
            Some(mut seg) if seg.kind == kind => {
                seg.y_end = y;
                seg.min_x = seg.min_x.min(row.min_x);
                seg.max_x = seg.max_x.max(row.max_x);
                seg.score += width;
                current = Some(seg);
            }
            previous => {
                if let Some(done) = previous {
                    flush(done, &mut segments);
                }
                current = Some(Segment {
                    kind,
                    y_start: y,
                    y_end: y,
                    min_x: row.min_x,
                    max_x: row.max_x,
                    score: width,
                });
            }
        }
        gap = 0;
    }
    if let Some(done) = current {
        flush(done, &mut segments);
    }
    segments
}

fn best_segments(segments: &[Segment], kind: LabelKind, limit: usize) -> Vec<Segment> {
    let mut matching: Vec<Segment> = segments.iter().filter(|s| s.kind == kind).cloned().collect();
    matching.sort_by(|a, b| b.score.cmp(&a.score));
    matching.truncate(limit);
    matching
}

/// Entry, stop-loss, then up to `max_targets` take-profit labels (best first).
pub fn detect_axis_labels(img: &RgbImage, config: &AxisConfig) -> Result<Vec<RectangleDetection>> {
    let start_x = column_start(img.width(), config);
    let column_width = (img.width() - start_x).max(1);
    let rows = scan_rows(img, start_x, config);
    let segments = build_segments(&rows, config);
    tracing::debug!(segments = segments.len(), start_x, "scanned price axis");

    if segments.is_empty() {
        return Err(Error::AnnotationNotFound);
    }

    let picked = best_segments(&segments, LabelKind::Entry, 1)
        .into_iter()
        .chain(best_segments(&segments, LabelKind::StopLoss, 1))
        .chain(best_segments(&segments, LabelKind::TakeProfit, config.max_targets));

    Ok(picked
        .map(|seg| {
            let roi = Roi::from_corners(seg.min_x, seg.y_start, seg.max_x, seg.y_end);
            let coverage = seg.score as f32 / (seg.height() * column_width) as f32;
            RectangleDetection::new(roi, coverage, seg.kind.hue_label())
        })
        .collect())
}
