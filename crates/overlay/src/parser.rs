//! Variant JSON parsing

use crate::{FormVariantSpec, OverlayError, Result};

/// Parse a variant spec from a JSON string
///
/// Only the shape is checked here; call [`FormVariantSpec::validate`] to
/// check cross references.
pub fn parse_variant(json: &str) -> Result<FormVariantSpec> {
    serde_json::from_str(json).map_err(|e| OverlayError::ParseError(e.to_string()))
}

/// Parse and validate in one step
pub fn load_variant(json: &str) -> Result<FormVariantSpec> {
    let spec = parse_variant(json)?;
    spec.validate()?;
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VariantId;
    use pretty_assertions::assert_eq;

    const MINIMAL: &str = r#"{
        "id": "legal-entity",
        "template": { "path": "plantilla.pdf", "outputName": "formulario.pdf" },
        "registry": {
            "razonSocial": { "x": 100, "y": 500 },
            "orden_nal": { "x": 46, "y": 586 }
        },
        "markings": { "orden": { "nal": "orden_nal" } }
    }"#;

    #[test]
    fn test_parse_minimal_variant() {
        let spec = parse_variant(MINIMAL).unwrap();
        assert_eq!(spec.id, VariantId::LegalEntity);
        assert_eq!(spec.template.pages, 1);
        assert_eq!(spec.preview_scale, 1.5);
        assert_eq!(spec.fonts.export_text, 12.0);
        assert!(spec.groups.is_empty());
        assert_eq!(spec.resolve_marking("orden", "nal").map(|c| c.x), Some(46.0));
        load_variant(MINIMAL).unwrap();
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = parse_variant(r#"{"id": "legal-entity"}"#).unwrap_err();
        assert!(matches!(err, OverlayError::ParseError(_)));

        let err = parse_variant(&MINIMAL.replace("legal-entity", "persona")).unwrap_err();
        assert!(err.to_string().contains("persona"));
    }

    #[test]
    fn test_load_rejects_dangling_marker() {
        let json = MINIMAL.replace(r#""nal": "orden_nal""#, r#""nal": "orden_nacional""#);
        assert!(parse_variant(&json).is_ok());
        let err = load_variant(&json).unwrap_err();
        assert!(matches!(err, OverlayError::InvalidSpec(msg) if msg.contains("orden_nacional")));
    }
}
