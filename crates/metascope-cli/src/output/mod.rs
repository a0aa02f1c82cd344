//! Output formatting modules.

pub mod json;
pub mod table;

pub use json::format_json;
pub use table::{format_stats, format_table};
