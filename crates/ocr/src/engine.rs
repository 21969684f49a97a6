//! OCR engine trait

use image::DynamicImage;

use crate::error::OcrError;
use crate::types::OcrWord;

/// Unified OCR engine interface.
pub trait OcrEngine: Send {
    /// Recognizes the words of an image.
    fn recognize_image(&mut self, img: &DynamicImage) -> Result<Vec<OcrWord>, OcrError>;

    /// Engine version, for logs and reports.
    fn version(&self) -> Option<&str> {
        None
    }
}
