//! PDF backend: pdfium for text, search and rendering; lopdf for applying
//! redactions to content streams and images.

pub mod document;
pub mod extract;
pub mod font;
pub mod image;
pub mod pdfium;
pub mod redact;
pub mod text;
pub mod utils;

use blackline_core::CoreError;
use blackline_ocr::OcrError;
use thiserror::Error;

pub use document::{OcrMode, PdfRedactionDocument, DEFAULT_OCR_DPI};
pub use pdfium::bind_pdfium;
pub use redact::CommitStats;

pub type Result<T> = std::result::Result<T, PdfError>;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("pdfium is not available: {0}")]
    PdfiumUnavailable(String),
    #[error("pdfium: {0}")]
    Pdfium(String),
    #[error("PDF structure: {0}")]
    Structure(#[from] lopdf::Error),
    #[error("encrypted documents are not supported")]
    Encrypted,
    #[error("page {0} does not exist")]
    PageNotFound(usize),
    #[error("content stream: {0}")]
    Content(String),
    #[error("image: {0}")]
    Image(String),
    #[error("OCR: {0}")]
    Ocr(#[from] OcrError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PdfError> for CoreError {
    fn from(e: PdfError) -> Self {
        match e {
            PdfError::PageNotFound(page) => CoreError::PageOutOfRange(page),
            other => CoreError::Document(other.to_string()),
        }
    }
}
