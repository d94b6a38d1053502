//! End-to-end tests for the overlay engine
//!
//! Templates are synthetic PDFs built with lopdf; previews run on blank
//! rasters without a font.

use image::{Rgba, RgbaImage};
use lopdf::{dictionary, Document, Object, Stream};
use overlay::blocks::{EDUCATION_CONTAINER, MAIN_EXPERIENCE_CONTAINER};
use overlay::persist::{DirStore, MemoryFlatStore};
use overlay::{
    build_plan, builtin, export_pdf, BlockCategory, DynamicBlockState, FormSnapshot, GroupEntry,
    MapFormSource, OverlayError, PersistenceBridge, PreviewSession, PreviewSettings, SavedForm,
    VariantId,
};
use pretty_assertions::assert_eq;

fn create_template(page_count: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::new();
    for i in 0..page_count {
        let contents_id = doc.add_object(Stream::new(
            dictionary! {},
            format!("% template page {}\n", i + 1).into_bytes(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Resources" => dictionary! {},
            "Contents" => contents_id,
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => page_count as i64,
            "Kids" => kids,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 1008.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

fn page_content(bytes: &[u8], page: u32) -> String {
    let doc = Document::load_mem(bytes).unwrap();
    let page_id = doc.get_pages()[&page];
    String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned()
}

fn blank_raster(scale: f64) -> RgbaImage {
    let (w, h) = ((612.0 * scale).round() as u32, (1008.0 * scale).round() as u32);
    RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255]))
}

#[test]
fn test_acme_scenario_draws_three_marks() {
    let spec = builtin(VariantId::LegalEntity).unwrap();
    let snapshot = FormSnapshot::new()
        .with_field("razonSocial", "ACME SAS")
        .with_field("nit", "900123456")
        .with_field("orden", "nal");

    let output = export_pdf(&spec, &create_template(1), &snapshot, None, None).unwrap();
    assert_eq!(output.marks.len(), 3);
    assert_eq!(output.file_name, "Hoja_de_Vida_Persona_Juridica.pdf");

    let content = page_content(&output.bytes, 1);
    assert!(content.contains("% template page 1"));
    assert!(content.contains("135 640 Td\n<41434D4520534153> Tj"));
    assert!(content.contains("46 586 Td\n<58> Tj"));
    assert!(content.contains("/HvF2 14 Tf"));
}

#[test]
fn test_orden_otro_draws_one_check() {
    let spec = builtin(VariantId::LegalEntity).unwrap();
    let snapshot = FormSnapshot::new()
        .with_field("orden", "otro")
        .with_field("ordenCual", "MIXTA");

    let output = export_pdf(&spec, &create_template(1), &snapshot, None, None).unwrap();
    let checks: Vec<(f64, f64)> = output
        .marks
        .iter()
        .filter(|m| m.text == "X")
        .map(|m| (m.x, m.y))
        .collect();
    assert_eq!(checks, vec![(166.0, 586.0)]);
    assert!(output.marks.iter().any(|m| m.field == "ordenCual"));
}

#[test]
fn test_letter_spaced_glyphs_increase() {
    let spec = builtin(VariantId::LegalEntity).unwrap();
    let snapshot = FormSnapshot::new().with_field("tipo", "PRIVADA");

    let output = export_pdf(&spec, &create_template(1), &snapshot, None, None).unwrap();
    assert_eq!(output.marks.len(), 7);
    assert!(output.marks.windows(2).all(|w| w[1].x > w[0].x));
    let text: String = output.marks.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(text, "PRIVADA");
}

#[test]
fn test_observaciones_wrap_properties() {
    let spec = builtin(VariantId::LegalEntityExtended).unwrap();

    let solid = "A".repeat(95);
    let plan = build_plan(&spec, &FormSnapshot::new().with_field("observaciones", &solid), None);
    assert_eq!(plan.mark_count(), 1);

    let words = ["contrato", "obra", "civil", "interventoria", "suministro"];
    let text: String = (0..40).map(|i| words[i % words.len()]).collect::<Vec<_>>().join(" ");
    let text = form_text_prefix(&text, 200);
    let plan = build_plan(&spec, &FormSnapshot::new().with_field("observaciones", &text), None);
    let lines: Vec<String> = plan
        .marks()
        .filter(|(_, m)| m.field == "observaciones")
        .map(|(_, m)| m.text.clone())
        .collect();

    assert!(lines.len() > 1);
    assert!(lines.iter().all(|l| l.chars().count() <= 95));
    assert_eq!(lines.join(" "), text);
}

/// First `n` chars, never ending on a space
fn form_text_prefix(text: &str, n: usize) -> String {
    text.chars().take(n).collect::<String>().trim_end().to_string()
}

#[test]
fn test_block_capacity_and_labels() {
    let mut blocks = DynamicBlockState::new();
    for _ in 0..5 {
        blocks.add(BlockCategory::Education, EDUCATION_CONTAINER);
    }
    assert!(blocks.add(BlockCategory::Education, EDUCATION_CONTAINER).is_empty());
    assert_eq!(blocks.count(BlockCategory::Education, EDUCATION_CONTAINER), 5);

    blocks.remove(BlockCategory::Education, EDUCATION_CONTAINER, 1);
    let labels: Vec<&str> = blocks
        .blocks(BlockCategory::Education, EDUCATION_CONTAINER)
        .map(|b| b.label.as_str())
        .collect();
    assert_eq!(labels, vec!["Estudio 1", "Estudio 2", "Estudio 3", "Estudio 4"]);
}

#[test]
fn test_save_restore_through_directory_store() {
    let spec = builtin(VariantId::NaturalPerson).unwrap();
    let mut blocks = DynamicBlockState::new();
    blocks.set_employment("NO");
    blocks.add(BlockCategory::Experience, MAIN_EXPERIENCE_CONTAINER);
    let source = MapFormSource::new()
        .with_value("nombres", "ana maria")
        .with_block(MAIN_EXPERIENCE_CONTAINER, [("empresa", "globex"), ("fechaIngreso", "2019-02-01")]);
    let snapshot = overlay::collect(&spec, &source, &blocks);

    let dir = tempfile::tempdir().unwrap();
    let form = SavedForm::new(spec.id, snapshot.clone(), blocks.clone());
    {
        let mut bridge = PersistenceBridge::new(Some(DirStore::open(dir.path()).unwrap()), MemoryFlatStore::new());
        assert!(bridge.save(&form));
    }

    let bridge = PersistenceBridge::new(Some(DirStore::open(dir.path()).unwrap()), MemoryFlatStore::new());
    let restored = bridge.restore().unwrap();
    assert_eq!(restored, form);
    assert_eq!(restored.snapshot.entries(BlockCategory::Experience)[0].get("empresa"), "GLOBEX");
}

#[test]
fn test_preview_and_export_place_marks_together() {
    let spec = builtin(VariantId::NaturalPerson).unwrap();
    let snapshot = FormSnapshot::new()
        .with_field("apellido1", "PEREZ")
        .with_field("nombres", "ANA MARIA")
        .with_field("tipoDocumento", "CC")
        .with_field("fechaNacimiento", "1990-04-07")
        .with_field("nivelEducativo", "11")
        .with_field("tituloObtenidoBachiller", "BACHILLER ACADEMICO")
        .with_entry(
            BlockCategory::Language,
            GroupEntry::new(0).with("idioma", "INGLES").with("habla", "BIEN"),
        );

    let output = export_pdf(&spec, &create_template(3), &snapshot, None, None).unwrap();
    let scale = spec.preview_scale;
    let mut preview = PreviewSession::new(spec, PreviewSettings::default());
    preview.set_base_page(1, blank_raster(scale));
    let frame = preview.redraw(&snapshot, 1, 0, None).unwrap();
    let height = frame.image.height() as f64;

    let exported: Vec<_> = output.marks.iter().filter(|m| m.page == 1).collect();
    assert_eq!(exported.len(), frame.marks.len());
    for (export, canvas) in exported.iter().zip(&frame.marks) {
        assert_eq!((&export.field, &export.text), (&canvas.field, &canvas.text));
        assert!((canvas.x as f64 / scale - export.x).abs() < 1e-3, "{}", export.field);
        assert!(((height - canvas.y as f64) / scale - export.y).abs() < 1e-3, "{}", export.field);
    }
}

#[test]
fn test_experience_overflow_duplicates_page_two() {
    let spec = builtin(VariantId::NaturalPerson).unwrap();
    let mut snapshot = FormSnapshot::new().with_field("trabajaActualmente", "NO");
    for (i, name) in ["UNO", "DOS", "TRES"].iter().enumerate() {
        snapshot.push_entry(BlockCategory::Experience, GroupEntry::new(0).with("empresa", *name));
        assert_eq!(snapshot.entries(BlockCategory::Experience).len(), i + 1);
    }
    snapshot.push_entry(BlockCategory::Experience, GroupEntry::new(1).with("empresa", "CUATRO"));

    let output = export_pdf(&spec, &create_template(3), &snapshot, None, None).unwrap();
    assert_eq!(output.page_count, 4);
    assert!(page_content(&output.bytes, 3).contains("% template page 2"));
    assert!(page_content(&output.bytes, 4).contains("% template page 3"));

    let cuatro = output.marks.iter().find(|m| m.text == "CUATRO").unwrap();
    assert_eq!((cuatro.page, cuatro.y), (3, 552.0));
    let uno = output.marks.iter().find(|m| m.text == "UNO").unwrap();
    assert_eq!((uno.page, uno.y), (2, 422.0));
}

#[test]
fn test_template_failure_leaves_snapshot_untouched() {
    let spec = builtin(VariantId::Simplified).unwrap();
    let snapshot = FormSnapshot::new().with_field("apellido1", "PEREZ");
    let before = snapshot.clone();
    let err = export_pdf(&spec, &[], &snapshot, None, None).unwrap_err();
    assert!(matches!(err, OverlayError::Template(_)));
    assert_eq!(snapshot, before);
}
