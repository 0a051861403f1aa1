/// Analysis modules — post-scan passes over a settled tree.
pub mod large_items;
pub mod metrics;

pub use large_items::{large_items, LargeItem};
pub use metrics::{is_large_item, percent_of, recompute, LARGE_ITEM_PERCENT};
