//! Shared OCR types

use serde::{Deserialize, Serialize};

/// Bounding box relative to the image (0-1), top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl BBox {
    /// Smallest box enclosing both.
    pub fn union(&self, other: &BBox) -> BBox {
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = (self.x + self.w).max(other.x + other.w);
        let y1 = (self.y + self.h).max(other.y + other.h);
        BBox {
            x: x0,
            y: y0,
            w: x1 - x0,
            h: y1 - y0,
        }
    }
}

/// One recognized word with its place in Tesseract's layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrWord {
    pub text: String,
    /// 0-1
    pub confidence: f32,
    pub bbox: BBox,
    pub block: u32,
    pub par: u32,
    pub line: u32,
}

/// Words sharing a (block, paragraph, line) key, in reading order.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrLine {
    pub text: String,
    pub bbox: BBox,
    pub words: Vec<OcrWord>,
}

/// Groups consecutive words by line key. Tesseract emits words in reading
/// order, so a key change always starts a new line.
pub fn group_lines(words: &[OcrWord]) -> Vec<OcrLine> {
    let mut lines: Vec<OcrLine> = Vec::new();
    let mut current_key = None;

    for word in words {
        let key = (word.block, word.par, word.line);
        match lines.last_mut() {
            Some(line) if current_key == Some(key) => {
                line.text.push(' ');
                line.text.push_str(&word.text);
                line.bbox = line.bbox.union(&word.bbox);
                line.words.push(word.clone());
            }
            _ => {
                lines.push(OcrLine {
                    text: word.text.clone(),
                    bbox: word.bbox,
                    words: vec![word.clone()],
                });
                current_key = Some(key);
            }
        }
    }

    lines
}

/// Tesseract CLI settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TesseractConfig {
    /// Path to the tesseract executable
    pub binary_path: Option<String>,
    /// tessdata directory
    pub tessdata_path: Option<String>,
    /// Language, e.g. "eng" or "deu+eng"
    pub lang: Option<String>,
    /// Page segmentation mode (0-13)
    pub psm: Option<u8>,
    /// OCR engine mode (0-3)
    pub oem: Option<u8>,
}

impl TesseractConfig {
    pub fn binary_or_default(&self) -> &str {
        self.binary_path.as_deref().unwrap_or("tesseract")
    }

    pub fn lang_or_default(&self) -> &str {
        self.lang.as_deref().unwrap_or("eng")
    }

    pub fn psm_or_default(&self) -> u8 {
        self.psm.unwrap_or(6)
    }

    pub fn oem_or_default(&self) -> u8 {
        self.oem.unwrap_or(1)
    }
}
