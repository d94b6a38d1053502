//! PDF Core - Low-level PDF manipulation
//!
//! This crate provides functionality for:
//! - Opening and saving PDF documents
//! - Drawing text with the standard Helvetica fonts
//! - Inserting images (JPEG, PNG with transparency)
//! - Duplicating template pages in place and appending blank pages
//!
//! # Example
//!
//! ```ignore
//! use pdf_core::{PdfDocument, StandardFont};
//!
//! let mut doc = PdfDocument::open_from_bytes(&template)?;
//! doc.draw_text("PEREZ", 1, 65.0, 605.0, StandardFont::HelveticaBold, 10.0)?;
//! let copy = doc.duplicate_page_after(2)?;  // new page 3
//! let bytes = doc.to_bytes()?;
//! ```

mod content;
mod document;
mod image;
mod standard_font;

pub use content::{generate_image_operators, generate_text_operators, TextRenderContext};
pub use document::PdfDocument;
pub use image::{detect_format, ImageFormat, ImageXObject};
pub use standard_font::{encode_win_ansi, StandardFont};

use thiserror::Error;

/// Errors that can occur during PDF operations
#[derive(Debug, Error)]
pub enum PdfError {
    #[error("Failed to open PDF: {0}")]
    OpenError(String),

    #[error("Failed to save PDF: {0}")]
    SaveError(String),

    #[error("Invalid page number: {0} (document has {1} pages)")]
    InvalidPage(usize, usize),

    #[error("Image error: {0}")]
    ImageError(String),

    #[error("PDF parsing error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Lopdf error: {0}")]
    LopdfError(#[from] lopdf::Error),
}

/// Result type for PDF operations
pub type Result<T> = std::result::Result<T, PdfError>;
