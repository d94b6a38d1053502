//! Pixel drawing for the preview canvas

use ab_glyph::{point, Font, FontVec, PxScale, ScaleFont};
use image::{imageops, GrayImage, Luma, RgbaImage};
use pdf_core::StandardFont;

const INK: [u8; 3] = [0, 0, 0];

/// Blend `color` into one pixel; out-of-bounds pixels are ignored
pub(crate) fn blend(image: &mut RgbaImage, x: i64, y: i64, color: [u8; 3], alpha: f32) {
    if x < 0 || y < 0 || x >= image.width() as i64 || y >= image.height() as i64 {
        return;
    }
    let alpha = alpha.clamp(0.0, 1.0);
    let pixel = image.get_pixel_mut(x as u32, y as u32);
    for i in 0..3 {
        pixel[i] = (color[i] as f32 * alpha + pixel[i] as f32 * (1.0 - alpha)).round() as u8;
    }
    pixel[3] = pixel[3].max((alpha * 255.0).round() as u8);
}

/// Glyph source of the preview
///
/// With a loaded font glyphs are rasterized from outlines. Without one the
/// Helvetica-Bold metrics of the export are used to draw solid glyph boxes,
/// so positions and advances still match the export.
pub(crate) enum Pen<'a> {
    Outline(&'a FontVec),
    Metrics,
}

impl Pen<'_> {
    /// Horizontal advance of one char in pixels
    pub fn advance(&self, c: char, px: f32) -> f32 {
        match self {
            Pen::Outline(font) => {
                let scaled = font.as_scaled(PxScale::from(px));
                scaled.h_advance(font.glyph_id(c))
            }
            Pen::Metrics => StandardFont::HelveticaBold.char_width(c, px) as f32,
        }
    }

    /// Width of a run in pixels
    pub fn width(&self, text: &str, px: f32) -> f32 {
        text.chars().map(|c| self.advance(c, px)).sum()
    }

    /// Draw one char with its baseline at `baseline`, returning the advance
    pub fn draw_char(&self, target: &mut dyn FnMut(i64, i64, f32), c: char, x: f32, baseline: f32, px: f32) -> f32 {
        let advance = self.advance(c, px);
        if c.is_whitespace() {
            return advance;
        }

        match self {
            Pen::Outline(font) => {
                let glyph = font
                    .glyph_id(c)
                    .with_scale_and_position(PxScale::from(px), point(x, baseline));
                if let Some(outlined) = font.outline_glyph(glyph) {
                    let bounds = outlined.px_bounds();
                    outlined.draw(|gx, gy, coverage| {
                        target(
                            bounds.min.x as i64 + gx as i64,
                            bounds.min.y as i64 + gy as i64,
                            coverage,
                        )
                    });
                }
            }
            Pen::Metrics if c == 'X' => {
                // Cross spanning the cap height
                let size = (px * 0.7).max(1.0);
                let steps = (size * 2.0).ceil() as i64;
                for s in 0..=steps {
                    let t = s as f32 / steps as f32;
                    let dx = (x + t * size).round() as i64;
                    for yy in [baseline - t * size, baseline - (1.0 - t) * size] {
                        target(dx, yy.round() as i64, 1.0);
                        target(dx + 1, yy.round() as i64, 1.0);
                    }
                }
            }
            Pen::Metrics => {
                let top = (baseline - px * 0.7).round() as i64;
                let left = x.round() as i64;
                let right = (x + advance * 0.8).round() as i64;
                for yy in top..baseline.round() as i64 {
                    for xx in left..right.max(left + 1) {
                        target(xx, yy, 1.0);
                    }
                }
            }
        }
        advance
    }

    /// Draw a run, returning the pen position after the last glyph
    ///
    /// `spacing` is added after every glyph.
    pub fn draw_text(&self, image: &mut RgbaImage, text: &str, x: f32, baseline: f32, px: f32, spacing: f32) -> f32 {
        let mut pen = x;
        let mut put = |xx: i64, yy: i64, coverage: f32| blend(image, xx, yy, INK, coverage);
        for c in text.chars() {
            pen += self.draw_char(&mut put, c, pen, baseline, px) + spacing;
        }
        pen
    }

    /// Ascent of the pen in pixels
    pub fn ascent(&self, px: f32) -> f32 {
        match self {
            Pen::Outline(font) => font.as_scaled(PxScale::from(px)).ascent(),
            Pen::Metrics => px * 0.72,
        }
    }
}

/// Scale an image into a box and draw it over the canvas
pub(crate) fn composite(canvas: &mut RgbaImage, image: &RgbaImage, x: i64, y: i64, width: u32, height: u32) {
    if width == 0 || height == 0 {
        return;
    }
    let scaled = imageops::resize(image, width, height, imageops::FilterType::Triangle);
    imageops::overlay(canvas, &scaled, x, y);
}

/// Precomputed watermark coverage for one canvas size
///
/// Stored sparsely: only covered pixels are kept.
#[derive(Debug, Clone)]
pub(crate) struct WatermarkLayer {
    width: u32,
    height: u32,
    alpha: f32,
    pixels: Vec<(u32, u32, f32)>,
}

impl WatermarkLayer {
    /// Text size for a canvas
    pub fn font_size(width: u32, height: u32) -> f32 {
        ((width.min(height) as f32 / 8.0).round()).max(32.0)
    }

    /// Render the layer: five copies of `text`, centered and rotated -45
    /// degrees about the canvas center, one line step apart
    pub fn build(pen: &Pen<'_>, text: &str, width: u32, height: u32, alpha: f32) -> Self {
        let px = Self::font_size(width, height);
        let step = (px * 1.9).round();

        // One unrotated line of text
        let ascent = pen.ascent(px).ceil();
        let stamp_w = pen.width(text, px).ceil().max(1.0) as u32 + 2;
        let stamp_h = (px * 1.3).ceil() as u32;
        let mut stamp = GrayImage::new(stamp_w, stamp_h);
        {
            let mut put = |x: i64, y: i64, coverage: f32| {
                if x >= 0 && y >= 0 && (x as u32) < stamp_w && (y as u32) < stamp_h {
                    let value = (coverage.clamp(0.0, 1.0) * 255.0).round() as u8;
                    let pixel = stamp.get_pixel_mut(x as u32, y as u32);
                    pixel[0] = pixel[0].max(value);
                }
            };
            let mut pen_x = 1.0;
            for c in text.chars() {
                pen_x += pen.draw_char(&mut put, c, pen_x, ascent, px);
            }
        }

        let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
        let (sin, cos) = std::f32::consts::FRAC_PI_4.sin_cos();
        let half_w = stamp_w as f32 / 2.0;
        let mut pixels = Vec::new();

        for y in 0..height {
            for x in 0..width {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                // Inverse of the -45 degree canvas rotation
                let tu = cos * dx - sin * dy;
                let tv = sin * dx + cos * dy;
                let sx = (tu + half_w).floor();
                if sx < 0.0 || sx >= stamp_w as f32 {
                    continue;
                }

                let mut coverage = 0u8;
                for line in -2i32..=2 {
                    let sy = (tv - line as f32 * step + ascent).floor();
                    if sy >= 0.0 && sy < stamp_h as f32 {
                        let Luma([v]) = *stamp.get_pixel(sx as u32, sy as u32);
                        coverage = coverage.max(v);
                    }
                }
                if coverage > 0 {
                    pixels.push((x, y, coverage as f32 / 255.0));
                }
            }
        }

        Self {
            width,
            height,
            alpha,
            pixels,
        }
    }

    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }

    #[cfg(test)]
    pub fn covered(&self) -> usize {
        self.pixels.len()
    }

    /// Blend the layer over a canvas of the same size
    pub fn apply(&self, canvas: &mut RgbaImage) {
        for &(x, y, coverage) in &self.pixels {
            blend(canvas, x as i64, y as i64, INK, coverage * self.alpha);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn blank_page(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, image::Rgba([255, 255, 255, 255]))
    }

    fn dark_pixels(image: &RgbaImage) -> usize {
        image.pixels().filter(|p| p[0] < 128).count()
    }

    #[test]
    fn test_blend_ignores_out_of_bounds() {
        let mut image = blank_page(2, 2);
        blend(&mut image, -1, 0, INK, 1.0);
        blend(&mut image, 2, 1, INK, 1.0);
        assert_eq!(dark_pixels(&image), 0);
        blend(&mut image, 1, 1, INK, 0.5);
        assert_eq!(image.get_pixel(1, 1)[0], 128);
    }

    #[test]
    fn test_metric_pen_matches_export_advance() {
        let pen = Pen::Metrics;
        let expected = StandardFont::HelveticaBold.text_width("ACME", 15.0) as f32;
        assert!((pen.width("ACME", 15.0) - expected).abs() < 1e-3);

        let mut image = blank_page(120, 40);
        let end = pen.draw_text(&mut image, "AB", 10.0, 30.0, 15.0, 3.0);
        assert!((end - (10.0 + expected / 2.0 + 6.0)).abs() < 5.0);
        assert!(dark_pixels(&image) > 0);
    }

    #[test]
    fn test_watermark_layer() {
        assert_eq!(WatermarkLayer::font_size(200, 300), 32.0);
        assert_eq!(WatermarkLayer::font_size(918, 1512), 115.0);

        let layer = WatermarkLayer::build(&Pen::Metrics, "FORMATOUNICO.COM", 400, 400, 0.12);
        assert!(layer.fits(400, 400));
        assert!(layer.covered() > 0);

        let mut canvas = blank_page(400, 400);
        layer.apply(&mut canvas);
        // Faint: nothing goes dark
        assert_eq!(dark_pixels(&canvas), 0);
        assert!(canvas.pixels().any(|p| p[0] < 255));
    }
}
