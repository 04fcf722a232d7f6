//! Display formatting helpers shared by the library and the CLI.

pub mod format;

pub use format::{format_age_minutes, format_currency, format_date, format_votes, truncate_string};
