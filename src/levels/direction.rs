use crate::models::{Direction, RectangleDetection};

/// Trade direction from where the boxes sit on screen. Smaller `y` is a
/// higher price.
pub fn infer_direction(
    entry: Option<&RectangleDetection>,
    take_profit: Option<&RectangleDetection>,
    stop_loss: Option<&RectangleDetection>,
) -> Direction {
    let above = |a: &RectangleDetection, b: &RectangleDetection| a.center.y < b.center.y;

    match (entry, take_profit, stop_loss) {
        (Some(entry), Some(tp), _) => {
            if above(tp, entry) { Direction::Long } else { Direction::Short }
        }
        (Some(entry), None, Some(sl)) => {
            if above(sl, entry) { Direction::Short } else { Direction::Long }
        }
        (None, Some(tp), Some(sl)) => {
            if above(tp, sl) { Direction::Long } else { Direction::Short }
        }
        _ => {
            tracing::warn!(
                entry = entry.is_some(),
                take_profit = take_profit.is_some(),
                stop_loss = stop_loss.is_some(),
                "direction is ambiguous, assuming LONG"
            );
            Direction::Long
        }
    }
}
