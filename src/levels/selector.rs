use crate::config::DetectionStrategy;
use crate::levels::direction::infer_direction;
use crate::levels::numbers::NumberParser;
use crate::models::{Direction, HueLabel, OcrResult, ParsedLevels};

/// Worst-case stop: lowest price for LONG, highest for SHORT.
pub fn select_stop(values: &[f64], direction: Direction) -> Option<f64> {
    let mut iter = values.iter().copied();
    let first = iter.next()?;
    Some(iter.fold(first, |acc, v| match direction {
        Direction::Long => acc.min(v),
        Direction::Short => acc.max(v),
    }))
}

/// Best `max` targets, best first.
pub fn select_targets(values: &[f64], direction: Direction, max: usize) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    match direction {
        Direction::Long => sorted.into_iter().rev().take(max).collect(),
        Direction::Short => sorted.into_iter().take(max).collect(),
    }
}

/// Candidate closest to the stop/first-target midpoint; the first candidate
/// when there is no midpoint.
pub fn select_entry(candidates: &[f64], first_target: Option<f64>, stop: Option<f64>) -> Option<f64> {
    let midpoint = match (first_target, stop) {
        (Some(target), Some(stop)) => (target + stop) / 2.0,
        _ => return candidates.first().copied(),
    };

    let mut best: Option<f64> = None;
    for &candidate in candidates {
        let closer = match best {
            Some(current) => (candidate - midpoint).abs() < (current - midpoint).abs(),
            None => true,
        };
        if closer {
            best = Some(candidate);
        }
    }
    best
}

/// Build the trade plan from recognized regions, in detection order.
///
/// Marker boxes use the first box of each color. Price-axis labels are one
/// per target, so every green label contributes take-profit values.
pub fn assemble_levels(
    results: &[OcrResult],
    parser: &NumberParser,
    strategy: DetectionStrategy,
    max_targets: usize,
) -> ParsedLevels {
    let first = |label: HueLabel| results.iter().find(|r| r.detection.hue_label == label);
    let entry_region = first(HueLabel::Neutral);
    let tp_region = first(HueLabel::Green);
    let sl_region = first(HueLabel::Red);

    let direction = infer_direction(
        entry_region.map(|r| &r.detection),
        tp_region.map(|r| &r.detection),
        sl_region.map(|r| &r.detection),
    );

    let parse = |region: Option<&OcrResult>| {
        region.map(|r| parser.parse(&r.raw_text)).unwrap_or_default()
    };

    let tp_values: Vec<f64> = match strategy {
        DetectionStrategy::MarkerBoxes => parse(tp_region),
        DetectionStrategy::PriceAxis => results
            .iter()
            .filter(|r| r.detection.hue_label == HueLabel::Green)
            .flat_map(|r| parser.parse(&r.raw_text))
            .collect(),
    };

    let stop = select_stop(&parse(sl_region), direction);
    let targets = select_targets(&tp_values, direction, max_targets);
    let entry = select_entry(&parse(entry_region), targets.first().copied(), stop);

    ParsedLevels {
        direction,
        entry,
        stop,
        targets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RectangleDetection, Roi};

    fn region(y: u32, label: HueLabel, text: &str) -> OcrResult {
        OcrResult {
            detection: RectangleDetection::new(Roi::new(10, y, 200, 40), 0.1, label),
            raw_text: text.to_string(),
        }
    }

    #[test]
    fn stop_is_worst_case() {
        let values = [59800.0, 59500.0, 59900.0];
        assert_eq!(select_stop(&values, Direction::Long), Some(59500.0));
        assert_eq!(select_stop(&values, Direction::Short), Some(59900.0));
        assert_eq!(select_stop(&[], Direction::Long), None);
    }

    #[test]
    fn long_targets_descend() {
        let values = [62000.0, 64000.0, 61000.0, 63000.0];
        assert_eq!(
            select_targets(&values, Direction::Long, 3),
            vec![64000.0, 63000.0, 62000.0]
        );
    }

    #[test]
    fn short_targets_ascend() {
        let values = [58000.0, 56000.0, 59000.0, 57000.0];
        assert_eq!(
            select_targets(&values, Direction::Short, 3),
            vec![56000.0, 57000.0, 58000.0]
        );
        assert!(select_targets(&[], Direction::Short, 3).is_empty());
    }

    #[test]
    fn entry_closest_to_midpoint() {
        assert_eq!(select_entry(&[60500.0, 61100.0], Some(62000.0), Some(60000.0)), Some(61100.0));
    }

    #[test]
    fn entry_ties_keep_first() {
        assert_eq!(select_entry(&[60900.0, 61100.0], Some(62000.0), Some(60000.0)), Some(60900.0));
    }

    #[test]
    fn entry_without_midpoint_is_first() {
        assert_eq!(select_entry(&[60500.0, 61100.0], None, Some(60000.0)), Some(60500.0));
        assert_eq!(select_entry(&[], Some(1.0), Some(2.0)), None);
    }

    #[test]
    fn assembles_long_plan() {
        let results = vec![
            region(100, HueLabel::Neutral, "61,000.00"),
            region(40, HueLabel::Green, "62,500 / 63,000"),
            region(160, HueLabel::Red, "59,800"),
        ];
        let levels = assemble_levels(&results, &NumberParser::default(), DetectionStrategy::MarkerBoxes, 3);
        assert_eq!(
            levels,
            ParsedLevels {
                direction: Direction::Long,
                entry: Some(61000.0),
                stop: Some(59800.0),
                targets: vec![63000.0, 62500.0],
            }
        );
    }

    #[test]
    fn duplicate_boxes_use_first_match() {
        let results = vec![
            region(40, HueLabel::Green, "62500.00"),
            region(45, HueLabel::Green, "70000.00"),
            region(160, HueLabel::Red, "59800.00"),
        ];
        let levels = assemble_levels(&results, &NumberParser::default(), DetectionStrategy::MarkerBoxes, 3);
        assert_eq!(levels.targets, vec![62500.0]);
        assert_eq!(levels.entry, None);
    }

    #[test]
    fn axis_labels_pool_targets() {
        let results = vec![
            region(100, HueLabel::Neutral, "61000"),
            region(160, HueLabel::Red, "59800"),
            region(40, HueLabel::Green, "63000"),
            region(60, HueLabel::Green, "62500"),
        ];
        let levels = assemble_levels(&results, &NumberParser::default(), DetectionStrategy::PriceAxis, 3);
        assert_eq!(levels.targets, vec![63000.0, 62500.0]);
        assert_eq!(levels.direction, Direction::Long);
    }
}
