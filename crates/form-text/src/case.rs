//! Case conventions of the printed forms

use serde::{Deserialize, Serialize};

/// How a collected value is normalized before it reaches a renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextCase {
    /// Keep the value exactly as typed (dates, numbers, legal-entity fields)
    #[default]
    Verbatim,
    /// Printed-form convention for names and addresses
    Upper,
    /// Email-like fields
    Lower,
}

impl TextCase {
    /// Apply the case rule to a value
    pub fn apply(self, value: &str) -> String {
        match self {
            TextCase::Verbatim => value.to_string(),
            TextCase::Upper => value.to_uppercase(),
            TextCase::Lower => value.to_lowercase(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbatim() {
        assert_eq!(TextCase::Verbatim.apply("Calle 5 #3-20"), "Calle 5 #3-20");
    }

    #[test]
    fn test_lower_email() {
        assert_eq!(TextCase::Lower.apply("Ana.Ruiz@Mail.COM"), "ana.ruiz@mail.com");
    }

    #[test]
    fn test_serde_names() {
        let case: TextCase = serde_json::from_str("\"upper\"").unwrap_or_default();
        assert_eq!(case, TextCase::Upper);
    }
}
