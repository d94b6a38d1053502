//! Content stream operators for overlays

/// Context for one text run
pub struct TextRenderContext {
    /// PDF font resource name (e.g., "HvF2")
    pub font_name: String,
    /// Font size in points
    pub font_size: f32,
}

/// Hex-encode already encoded font bytes for a `Tj` operand
pub fn hex_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2 + 2);
    out.push('<');
    for b in bytes {
        out.push_str(&format!("{b:02X}"));
    }
    out.push('>');
    out
}

/// Format a coordinate without trailing noise
fn num(v: f64) -> String {
    let rounded = (v * 1000.0).round() / 1000.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{rounded}")
    }
}

/// Generate PDF operators for a text run
///
/// # Arguments
/// * `text_hex` - Hex string operand (e.g., "<4142>")
/// * `x` - X coordinate in points (from left)
/// * `y` - Baseline Y coordinate in points (from bottom)
/// * `ctx` - Text rendering context
pub fn generate_text_operators(text_hex: &str, x: f64, y: f64, ctx: &TextRenderContext) -> Vec<u8> {
    let mut ops = String::new();
    ops.push_str("BT\n");
    ops.push_str("0 g\n");
    ops.push_str(&format!("/{} {} Tf\n", ctx.font_name, ctx.font_size));
    ops.push_str(&format!("{} {} Td\n", num(x), num(y)));
    ops.push_str(&format!("{text_hex} Tj\n"));
    ops.push_str("ET\n");
    ops.into_bytes()
}

/// Generate operators to paint an image XObject into a box
///
/// # Arguments
/// * `image_name` - Image resource name (e.g., "HvIm1")
/// * `x` - Lower-left X in points
/// * `y` - Lower-left Y in points
/// * `width` - Box width in points
/// * `height` - Box height in points
pub fn generate_image_operators(image_name: &str, x: f64, y: f64, width: f64, height: f64) -> Vec<u8> {
    format!(
        "q\n{} 0 0 {} {} {} cm\n/{image_name} Do\nQ\n",
        num(width),
        num(height),
        num(x),
        num(y)
    )
    .into_bytes()
}

/// Operators saving the template's graphics state before its own content
pub const ISOLATE_OPEN: &[u8] = b"q\n";

/// Operators restoring the template's graphics state before the overlay
pub const ISOLATE_CLOSE: &[u8] = b"\nQ\n";

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> TextRenderContext {
        TextRenderContext {
            font_name: "HvF2".to_string(),
            font_size: 10.0,
        }
    }

    #[test]
    fn test_hex_string() {
        assert_eq!(hex_string(b"AB"), "<4142>");
        assert_eq!(hex_string(&[0xD1]), "<D1>");
        assert_eq!(hex_string(&[]), "<>");
    }

    #[test]
    fn test_generate_text_operators() {
        let ops = generate_text_operators("<4142>", 65.0, 605.0, &ctx());
        let s = String::from_utf8(ops).unwrap();
        assert!(s.starts_with("BT\n"));
        assert!(s.contains("/HvF2 10 Tf"));
        assert!(s.contains("65 605 Td"));
        assert!(s.contains("<4142> Tj"));
        assert!(s.ends_with("ET\n"));
    }

    #[test]
    fn test_fractional_position() {
        let ops = generate_text_operators("<58>", 225.0, 201.5, &ctx());
        let s = String::from_utf8(ops).unwrap();
        assert!(s.contains("225 201.5 Td"));
    }

    #[test]
    fn test_text_is_black() {
        let s = String::from_utf8(generate_text_operators("<41>", 0.0, 0.0, &ctx())).unwrap();
        assert!(s.contains("BT\n0 g\n"));
    }

    #[test]
    fn test_generate_image_operators() {
        let ops = generate_image_operators("HvIm1", 250.0, 300.0, 120.0, 30.0);
        let s = String::from_utf8(ops).unwrap();
        assert!(s.contains("120 0 0 30 250 300 cm"));
        assert!(s.contains("/HvIm1 Do"));
        assert!(s.starts_with("q\n"));
        assert!(s.ends_with("Q\n"));
    }
}
