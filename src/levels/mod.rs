//! From recognized text to a trade plan.

pub mod direction;
pub mod numbers;
pub mod selector;

pub use direction::infer_direction;
pub use numbers::NumberParser;
pub use selector::{assemble_levels, select_entry, select_stop, select_targets};
