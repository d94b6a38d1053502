//! Greedy fixed-width line wrapping for free-text form fields

use crate::{FormTextError, Result};

/// Width rules for a wrapped field, counted in characters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineWrap {
    /// Longest line allowed
    pub max_chars: usize,
    /// A space at or before this index is not used as a break point
    pub min_break: usize,
}

impl Default for LineWrap {
    fn default() -> Self {
        Self {
            max_chars: 95,
            min_break: 70,
        }
    }
}

impl LineWrap {
    /// Create wrap rules, rejecting widths where no soft break could happen
    pub fn new(max_chars: usize, min_break: usize) -> Result<Self> {
        if max_chars == 0 || min_break >= max_chars {
            return Err(FormTextError::InvalidWrap {
                max: max_chars,
                min_break,
            });
        }
        Ok(Self {
            max_chars,
            min_break,
        })
    }
}

/// Split text into lines of at most `max_chars` characters
///
/// Each line breaks at the last space found within the allowed width when
/// that space sits past `min_break`; otherwise the line is cut hard at
/// `max_chars`. The space consumed by a soft break is dropped.
///
/// # Arguments
/// * `text` - Text to wrap
/// * `rules` - Width rules
///
/// # Examples
/// ```
/// use form_text::{wrap_greedy, LineWrap};
/// let solid = "A".repeat(95);
/// assert_eq!(wrap_greedy(&solid, LineWrap::default()).len(), 1);
/// ```
pub fn wrap_greedy(text: &str, rules: LineWrap) -> Vec<String> {
    let max = rules.max_chars.max(1);
    let mut lines = Vec::new();
    let mut rest: Vec<char> = text.chars().collect();

    while rest.len() > max {
        // A space right after the window still yields a full-width line
        let window = &rest[..=max];
        let soft = window
            .iter()
            .rposition(|c| *c == ' ')
            .filter(|idx| *idx > rules.min_break);

        match soft {
            Some(idx) => {
                lines.push(rest[..idx].iter().collect());
                rest.drain(..=idx);
            }
            None => {
                lines.push(rest[..max].iter().collect());
                rest.drain(..max);
            }
        }
    }

    if !rest.is_empty() {
        lines.push(rest.into_iter().collect());
    }

    lines
}
