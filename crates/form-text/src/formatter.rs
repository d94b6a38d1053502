//! Truncation, date and number formatting for form boxes

use chrono::{Datelike, NaiveDate};

use crate::{FormTextError, Result};

/// A date split into the separate boxes printed on the forms
///
/// Month inputs (`YYYY-MM`) have no day part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateParts {
    pub day: Option<String>,
    pub month: String,
    pub year: String,
}

impl DateParts {
    /// Parse an HTML date (`YYYY-MM-DD`) or month (`YYYY-MM`) value
    ///
    /// # Examples
    /// ```
    /// use form_text::DateParts;
    /// let parts = DateParts::parse_iso("2019-11").unwrap();
    /// assert_eq!(parts.day, None);
    /// assert_eq!(parts.month, "11");
    /// ```
    pub fn parse_iso(value: &str) -> Result<Self> {
        let value = value.trim();
        if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
            return Ok(Self::from_date(date));
        }

        let padded = format!("{value}-01");
        NaiveDate::parse_from_str(&padded, "%Y-%m-%d")
            .map(|date| {
                let mut parts = Self::from_date(date);
                parts.day = None;
                parts
            })
            .map_err(|_| FormTextError::InvalidDate(value.to_string()))
    }

    /// Split a calendar date
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            day: Some(format!("{:02}", date.day())),
            month: format!("{:02}", date.month()),
            year: date.year().to_string(),
        }
    }
}

/// Format a date as `dd/mm/yyyy`
pub fn format_dmy(date: NaiveDate) -> String {
    format!("{:02}/{:02}/{}", date.day(), date.month(), date.year())
}

/// Keep at most `max` characters of `text`
///
/// # Examples
/// ```
/// use form_text::truncate_chars;
/// assert_eq!(truncate_chars("BOGOTÁ D.C.", 6), "BOGOTÁ");
/// ```
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Parse a counter box value; blanks and garbage count as zero
pub fn lenient_number(value: &str) -> i64 {
    value.trim().parse::<i64>().unwrap_or(0)
}

/// Sum counter box values leniently
///
/// # Examples
/// ```
/// use form_text::sum_lenient;
/// assert_eq!(sum_lenient(["3", "", "x", "4"]), 7);
/// ```
pub fn sum_lenient<'a, I>(values: I) -> i64
where
    I: IntoIterator<Item = &'a str>,
{
    values.into_iter().map(lenient_number).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_full_date() {
        let parts = DateParts::parse_iso("1988-12-31").unwrap();
        assert_eq!(
            parts,
            DateParts {
                day: Some("31".into()),
                month: "12".into(),
                year: "1988".into(),
            }
        );
    }

    #[test]
    fn test_parse_month_value() {
        let parts = DateParts::parse_iso("2010-06").unwrap();
        assert_eq!(parts.day, None);
        assert_eq!(parts.month, "06");
        assert_eq!(parts.year, "2010");
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(
            DateParts::parse_iso("31/12/1988"),
            Err(FormTextError::InvalidDate("31/12/1988".into()))
        );
        assert!(DateParts::parse_iso("").is_err());
    }

    #[test]
    fn test_format_dmy() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(format_dmy(date), "09/03/2024");
    }

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate_chars("ÑÑÑÑ", 2), "ÑÑ");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn test_lenient_number() {
        assert_eq!(lenient_number(" 12 "), 12);
        assert_eq!(lenient_number(""), 0);
        assert_eq!(lenient_number("doce"), 0);
    }
}
