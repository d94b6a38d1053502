//! Raster preview path

use crate::plan::{build_plan, MarkKind, RenderPlan};
use crate::raster::{composite, Pen, WatermarkLayer};
use crate::schema::{FormVariantSpec, PreviewSettings};
use crate::snapshot::FormSnapshot;
use crate::{OverlayError, Result};
use ab_glyph::FontVec;
use chrono::NaiveDate;
use image::RgbaImage;
use std::collections::BTreeMap;

/// A mark as drawn on the canvas, in pixels (origin top-left, y down)
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasMark {
    pub field: String,
    pub text: String,
    pub x: f32,
    /// Baseline
    pub y: f32,
}

/// One redrawn page
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    pub template_page: usize,
    pub instance: usize,
    pub image: RgbaImage,
    pub marks: Vec<CanvasMark>,
}

/// Preview state of one form page
///
/// Holds the rasterized template pages, the preview font and the cached
/// watermark. Every redraw starts from a clean copy of the template raster.
pub struct PreviewSession {
    spec: FormVariantSpec,
    settings: PreviewSettings,
    base_pages: BTreeMap<usize, RgbaImage>,
    font: Option<FontVec>,
    signature: Option<RgbaImage>,
    watermark: Option<WatermarkLayer>,
}

impl PreviewSession {
    pub fn new(spec: FormVariantSpec, settings: PreviewSettings) -> Self {
        Self {
            spec,
            settings,
            base_pages: BTreeMap::new(),
            font: None,
            signature: None,
            watermark: None,
        }
    }

    pub fn spec(&self) -> &FormVariantSpec {
        &self.spec
    }

    pub fn settings(&self) -> &PreviewSettings {
        &self.settings
    }

    /// Set the raster of a template page, already scaled by the preview scale
    pub fn set_base_page(&mut self, template_page: usize, image: RgbaImage) {
        self.base_pages.insert(template_page, image);
    }

    /// Decode and set the raster of a template page
    pub fn set_base_page_encoded(&mut self, template_page: usize, data: &[u8]) -> Result<()> {
        let image = image::load_from_memory(data)?.to_rgba8();
        self.set_base_page(template_page, image);
        Ok(())
    }

    pub fn has_base_page(&self, template_page: usize) -> bool {
        self.base_pages.contains_key(&template_page)
    }

    /// Load the preview font (TTF/OTF)
    pub fn load_font(&mut self, data: Vec<u8>) -> Result<()> {
        let font = FontVec::try_from_vec(data).map_err(|e| OverlayError::Render(e.to_string()))?;
        self.font = Some(font);
        self.watermark = None;
        Ok(())
    }

    /// Set the signature image drawn into the variant's signature box
    pub fn set_signature(&mut self, data: &[u8]) -> Result<()> {
        self.signature = Some(image::load_from_memory(data)?.to_rgba8());
        Ok(())
    }

    pub fn clear_signature(&mut self) {
        self.signature = None;
    }

    /// Collect-free redraw: plan the snapshot and draw one page
    pub fn redraw(
        &mut self,
        snapshot: &FormSnapshot,
        template_page: usize,
        instance: usize,
        today: Option<NaiveDate>,
    ) -> Result<PreviewFrame> {
        let plan = build_plan(&self.spec, snapshot, today);
        self.render(&plan, template_page, instance)
    }

    /// Draw one physical page of a plan over a clean template raster
    pub fn render(&mut self, plan: &RenderPlan, template_page: usize, instance: usize) -> Result<PreviewFrame> {
        let mut image = self
            .base_pages
            .get(&template_page)
            .cloned()
            .ok_or_else(|| OverlayError::Render(format!("page {template_page} is not rasterized")))?;
        let scale = self.spec.preview_scale as f32;
        let height = image.height() as f32;
        let pen = match &self.font {
            Some(font) => Pen::Outline(font),
            None => Pen::Metrics,
        };

        let mut marks = Vec::new();
        if let Some(page) = plan.page(template_page, instance) {
            for mark in &page.marks {
                let x = mark.x as f32 * scale;
                let y = height - mark.y as f32 * scale;
                match mark.kind {
                    // One canvas mark per glyph, as the export places them
                    MarkKind::Spaced { preview, .. } => {
                        let mut pen_x = x;
                        for c in mark.text.chars() {
                            let glyph = c.to_string();
                            pen.draw_text(&mut image, &glyph, pen_x, y, mark.preview_size, 0.0);
                            marks.push(CanvasMark {
                                field: mark.field.clone(),
                                text: glyph,
                                x: pen_x,
                                y,
                            });
                            pen_x += pen.advance(c, mark.preview_size) + preview;
                        }
                    }
                    MarkKind::Text | MarkKind::Check => {
                        pen.draw_text(&mut image, &mark.text, x, y, mark.preview_size, 0.0);
                        marks.push(CanvasMark {
                            field: mark.field.clone(),
                            text: mark.text.clone(),
                            x,
                            y,
                        });
                    }
                }
            }
        }

        if let (Some(signature), Some(area)) = (&self.signature, self.spec.signature) {
            if area.page == template_page && instance == 0 {
                let width = (area.width.unwrap_or_default() as f32 * scale).round() as u32;
                let box_height = (area.height.unwrap_or_default() as f32 * scale).round() as u32;
                let left = (area.x as f32 * scale).round() as i64;
                let top = (height - (area.y + area.height.unwrap_or_default()) as f32 * scale).round() as i64;
                composite(&mut image, signature, left, top, width, box_height);
            }
        }

        let watermark = &self.settings.watermark;
        if watermark.enabled && !watermark.text.is_empty() {
            let (w, h) = image.dimensions();
            let stale = self.watermark.as_ref().map_or(true, |layer| !layer.fits(w, h));
            if stale {
                tracing::debug!(width = w, height = h, "building watermark layer");
                self.watermark = Some(WatermarkLayer::build(&pen, &watermark.text, w, h, watermark.alpha));
            }
            if let Some(layer) = &self.watermark {
                layer.apply(&mut image);
            }
        }

        Ok(PreviewFrame {
            template_page,
            instance,
            image,
            marks,
        })
    }
}
