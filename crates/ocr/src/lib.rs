//! OCR for scanned pages.
//!
//! Wraps the Tesseract CLI and returns word boxes normalized to the image
//! size, grouped into lines the way Tesseract reports its layout.

pub mod engine;
pub mod error;
pub mod tesseract;
pub mod types;

pub use engine::OcrEngine;
pub use error::OcrError;
pub use tesseract::{get_tesseract_version, TesseractEngine};
pub use types::{group_lines, BBox, OcrLine, OcrWord, TesseractConfig};
