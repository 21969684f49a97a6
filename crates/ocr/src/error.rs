//! OCR error type

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("tesseract is not available: {0}")]
    Unavailable(String),

    #[error("tesseract failed: {0}")]
    Engine(String),

    #[error("image processing failed: {0}")]
    ImageProcess(String),

    #[error("unexpected tesseract output: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
