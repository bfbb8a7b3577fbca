//! Terminal output.
//!
//! - `table`: plain-text table rendering
//! - `views`: section data to tables

pub mod table;
pub mod views;

pub use table::Table;
pub use views::{section_highlights, section_table};
