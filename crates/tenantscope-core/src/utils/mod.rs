//! Utility functions for string formatting and manipulation.

pub mod format;

// Re-export commonly used functions at module level
pub use format::{
    age_display, cmp_ignore_case, contains_ignore_case, format_bytes, format_date, format_epoch_ms,
    truncate_string,
};
