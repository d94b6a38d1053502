//! Fill a template from a saved snapshot
//! Run with: cargo run --example fill_form -- <variant> <template.pdf> <snapshot.json> [signature.png]
//!
//! Writes the export under output/ with the variant's download name and a
//! PNG preview of page 1 next to it.
//!
//! Set RUST_LOG=overlay=debug to see plan and render details.

use anyhow::{bail, Context};
use overlay::{build_plan, builtin, export_pdf, FormSnapshot, PreviewSession, PreviewSettings, VariantId};
use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 3 {
        bail!("usage: fill_form <variant> <template.pdf> <snapshot.json> [signature.png]");
    }

    let variant: VariantId = args[0].parse()?;
    let spec = builtin(variant)?;
    let template = fs::read(&args[1]).with_context(|| format!("reading {}", args[1]))?;
    let snapshot: FormSnapshot = serde_json::from_slice(&fs::read(&args[2])?)
        .with_context(|| format!("parsing {}", args[2]))?;
    let signature = args.get(3).map(fs::read).transpose()?;

    let secs = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    let today = chrono::DateTime::from_timestamp(secs as i64, 0).map(|dt| dt.date_naive());

    let plan = build_plan(&spec, &snapshot, today);
    println!("{}: {} marks on {} pages", spec.id, plan.mark_count(), plan.pages.len());

    fs::create_dir_all("output")?;
    let output = export_pdf(&spec, &template, &snapshot, signature.as_deref(), today)?;
    let pdf_path = format!("output/{}", output.file_name);
    fs::write(&pdf_path, &output.bytes)?;
    println!("Saved {} ({} pages, {} bytes)", pdf_path, output.page_count, output.bytes.len());

    // Without a rasterizer the preview runs on a blank page of the template size
    let scale = spec.preview_scale;
    let mut preview = PreviewSession::new(spec, PreviewSettings::default());
    let (w, h) = ((612.0 * scale).round() as u32, (1008.0 * scale).round() as u32);
    preview.set_base_page(1, image::RgbaImage::from_pixel(w, h, image::Rgba([255, 255, 255, 255])));
    if let Some(sig) = &signature {
        preview.set_signature(sig)?;
    }
    let frame = preview.redraw(&snapshot, 1, 0, today)?;
    frame.image.save("output/preview_page1.png")?;
    println!("Saved output/preview_page1.png ({} marks)", frame.marks.len());

    Ok(())
}
