//! Overlay Engine - fills fixed-layout "Hoja de Vida" templates
//!
//! This crate provides:
//! - Field registries and select-driven marker resolution per form variant
//! - Built-in variant specs (coordinate tables and drawing rules) loaded from JSON
//! - Form snapshots and the collector that builds them from a [`FormSource`]
//! - Dynamic block management (experience, education, language, extra pages)
//! - One render plan consumed by two paths: raster preview and PDF export
//! - Debounced redraw scheduling, persistence and payment confirmation helpers
//!
//! # Example
//!
//! ```ignore
//! use overlay::{builtin, export_pdf, FormSnapshot, VariantId};
//!
//! let spec = builtin(VariantId::LegalEntity)?;
//! let snapshot = FormSnapshot::new()
//!     .with_field("razonSocial", "ACME SAS")
//!     .with_field("orden", "nal");
//! let output = export_pdf(&spec, &template_bytes, &snapshot, None, None)?;
//! std::fs::write(&spec.template.output_name, output.bytes)?;
//! ```

pub mod blocks;
pub mod collect;
mod export;
pub mod parser;
pub mod payment;
pub mod persist;
mod plan;
mod preview;
mod raster;
mod registry;
mod schedule;
mod schema;
mod session;
mod snapshot;
pub mod variants;

pub use blocks::{BlockCategory, BlockDescriptor, BlockEvent, DynamicBlockState};
pub use collect::{collect, FormSource, MapFormSource};
pub use export::{export_pdf, ExportOutput, PlacedMark};
pub use parser::{load_variant, parse_variant};
pub use plan::{build_plan, Mark, MarkKind, PagePlan, RenderPlan};
pub use payment::{ConfirmationView, PaymentStatus, TransactionRef};
pub use persist::{FlatStore, PersistenceBridge, RecordStore, SavedForm};
pub use preview::{CanvasMark, PreviewFrame, PreviewSession};
pub use registry::{FieldCoordinate, FieldRegistry, SelectMarkingMap};
pub use schedule::RedrawScheduler;
pub use schema::*;
pub use session::{FormSession, FormSink};
pub use snapshot::{FormSnapshot, GroupEntry};
pub use variants::builtin;

use thiserror::Error;

/// Errors that can occur while filling a form
#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("Failed to parse variant: {0}")]
    ParseError(String),

    #[error("Unknown form variant: {0}")]
    UnknownVariant(String),

    #[error("Invalid variant spec: {0}")]
    InvalidSpec(String),

    #[error("Template unavailable: {0}")]
    Template(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Image error: {0}")]
    ImageError(String),

    #[error("PDF error: {0}")]
    PdfError(#[from] pdf_core::PdfError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Text error: {0}")]
    TextError(#[from] form_text::FormTextError),
}

impl From<image::ImageError> for OverlayError {
    fn from(err: image::ImageError) -> Self {
        OverlayError::ImageError(err.to_string())
    }
}

/// Result type for overlay operations
pub type Result<T> = std::result::Result<T, OverlayError>;
