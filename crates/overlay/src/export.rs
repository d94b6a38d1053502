//! PDF export path

use crate::plan::{build_plan, MarkKind, RenderPlan};
use crate::schema::FormVariantSpec;
use crate::snapshot::FormSnapshot;
use crate::{OverlayError, Result};
use chrono::NaiveDate;
use pdf_core::{PdfDocument, StandardFont};
use std::collections::BTreeMap;

/// Font of every overlay glyph
const EXPORT_FONT: StandardFont = StandardFont::HelveticaBold;

/// One draw call as written to the output
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedMark {
    pub field: String,
    pub text: String,
    /// 1-based physical page of the output
    pub page: usize,
    pub x: f64,
    pub y: f64,
}

/// Finished export
#[derive(Debug, Clone)]
pub struct ExportOutput {
    pub bytes: Vec<u8>,
    /// Suggested download name
    pub file_name: String,
    pub page_count: usize,
    pub marks: Vec<PlacedMark>,
}

/// Fill the template and return the finished document
///
/// # Arguments
/// * `spec` - Form variant
/// * `template` - Template PDF bytes
/// * `snapshot` - Collected form values
/// * `signature` - Optional PNG/JPEG signature drawn into the variant's box
/// * `today` - Render date for date stamps
///
/// # Errors
/// [`OverlayError::Template`] when the template cannot be read; nothing is
/// produced in that case.
pub fn export_pdf(
    spec: &FormVariantSpec,
    template: &[u8],
    snapshot: &FormSnapshot,
    signature: Option<&[u8]>,
    today: Option<NaiveDate>,
) -> Result<ExportOutput> {
    let mut doc =
        PdfDocument::open_from_bytes(template).map_err(|e| OverlayError::Template(e.to_string()))?;
    if doc.page_count() == 0 {
        return Err(OverlayError::Template("template has no pages".to_string()));
    }

    let plan = build_plan(spec, snapshot, today);
    let physical = prepare_pages(&mut doc, spec, &plan)?;
    let mut marks = Vec::with_capacity(plan.mark_count());

    for page in &plan.pages {
        let Some(&number) = physical.get(&(page.template_page, page.instance)) else {
            continue;
        };
        for mark in &page.marks {
            match mark.kind {
                MarkKind::Text | MarkKind::Check => {
                    doc.draw_text(&mark.text, number, mark.x, mark.y, EXPORT_FONT, mark.export_size)?;
                    marks.push(PlacedMark {
                        field: mark.field.clone(),
                        text: mark.text.clone(),
                        page: number,
                        x: mark.x,
                        y: mark.y,
                    });
                }
                MarkKind::Spaced { export, .. } => {
                    let mut x = mark.x;
                    for c in mark.text.chars() {
                        let glyph = c.to_string();
                        doc.draw_text(&glyph, number, x, mark.y, EXPORT_FONT, mark.export_size)?;
                        marks.push(PlacedMark {
                            field: mark.field.clone(),
                            text: glyph,
                            page: number,
                            x,
                            y: mark.y,
                        });
                        x += EXPORT_FONT.char_width(c, mark.export_size) + export as f64;
                    }
                }
            }
        }
    }

    if let (Some(data), Some(area)) = (signature, spec.signature) {
        let number = physical.get(&(area.page, 0)).copied();
        let (width, height) = (area.width.unwrap_or_default(), area.height.unwrap_or_default());
        match number.map(|n| doc.draw_image(data, n, area.x, area.y, width, height)) {
            Some(Ok(())) => tracing::debug!(page = area.page, "signature drawn"),
            Some(Err(e)) => tracing::warn!(error = %e, "signature skipped"),
            None => tracing::warn!(page = area.page, "signature page missing"),
        }
    }

    let page_count = doc.page_count();
    let bytes = doc.to_bytes()?;
    tracing::info!(
        variant = %spec.id,
        pages = page_count,
        marks = marks.len(),
        bytes = bytes.len(),
        "exported form"
    );

    Ok(ExportOutput {
        bytes,
        file_name: spec.template.output_name.clone(),
        page_count,
        marks,
    })
}

/// Add missing template pages and one copy per extra instance
///
/// Returns the physical page number of every (template page, instance).
fn prepare_pages(
    doc: &mut PdfDocument,
    spec: &FormVariantSpec,
    plan: &RenderPlan,
) -> Result<BTreeMap<(usize, usize), usize>> {
    let (width, height) = doc.page_size(1)?;
    while doc.page_count() < spec.template.pages {
        let added = doc.add_blank_page(width, height)?;
        tracing::debug!(page = added, "added blank template page");
    }

    let mut physical = BTreeMap::new();
    let mut inserted = 0;
    for template_page in 1..=spec.template.pages {
        let base = template_page + inserted;
        physical.insert((template_page, 0), base);
        for instance in 1..plan.instances(template_page) {
            let copy = doc.duplicate_page_after(base + instance - 1)?;
            physical.insert((template_page, instance), copy);
            inserted += 1;
        }
    }
    Ok(physical)
}
