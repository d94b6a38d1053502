//! Form Text - text rules shared by the preview and export paths
//!
//! This crate provides:
//! - Case normalization for printed-form conventions (upper/lower/as typed)
//! - Greedy fixed-width line wrapping
//! - Character-based truncation that never splits a code point
//! - ISO date splitting into day/month/year boxes
//! - Lenient numeric totals for year/month counters
//!
//! # Example
//!
//! ```ignore
//! use form_text::{wrap_greedy, DateParts, TextCase, LineWrap};
//!
//! let name = TextCase::Upper.apply("josé pérez");      // "JOSÉ PÉREZ"
//! let lines = wrap_greedy(&observations, LineWrap::default());
//! let birth = DateParts::parse_iso("1990-04-07")?;      // 07 / 04 / 1990
//! ```

mod case;
mod formatter;
mod linewrap;

pub use case::TextCase;
pub use formatter::{format_dmy, lenient_number, sum_lenient, truncate_chars, DateParts};
pub use linewrap::{wrap_greedy, LineWrap};

use thiserror::Error;

/// Errors that can occur during form text processing
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormTextError {
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid wrap width: max {max} must exceed min break {min_break}")]
    InvalidWrap { max: usize, min_break: usize },
}

/// Result type for form text operations
pub type Result<T> = std::result::Result<T, FormTextError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upper_keeps_spanish_letters() {
        assert_eq!(TextCase::Upper.apply("peña núñez"), "PEÑA NÚÑEZ");
    }

    #[test]
    fn test_date_parts_padded() {
        let parts = DateParts::parse_iso("2001-02-03").unwrap();
        assert_eq!(parts.day.as_deref(), Some("03"));
        assert_eq!(parts.month, "02");
        assert_eq!(parts.year, "2001");
    }
}
