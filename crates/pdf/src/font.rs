//! Glyph advance widths, read from the page's font resources.
//!
//! Simple fonts use `/Widths` from `/FirstChar`; Type0 fonts use the
//! descendant's `/W` and `/DW` with two-byte codes. Fonts without widths
//! fall back to the standard 14 metrics of their base font.

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object};

use crate::utils::{get_number, resolve};

/// Helvetica widths for codes 32..=126.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, 556, 556, 556,
    556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, 1015, 667, 667, 722, 722, 667,
    611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667,
    667, 611, 278, 278, 278, 469, 556, 222, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500,
    222, 833, 556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

/// Times-Roman widths for codes 32..=126.
const TIMES_ROMAN_WIDTHS: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278, 500, 500, 500,
    500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444, 921, 722, 667, 667, 722, 611,
    556, 722, 722, 333, 389, 722, 611, 889, 722, 722, 556, 722, 667, 556, 611, 722, 722, 944, 722,
    722, 611, 333, 278, 333, 469, 500, 333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500,
    278, 778, 500, 500, 500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];

const COURIER_WIDTH: f32 = 600.0;

/// Fonts of a page keyed by their resource name (the `Tf` operand).
pub type FontMap = HashMap<Vec<u8>, FontMetrics>;

/// Advance widths of one font in glyph space (thousandths of text space).
#[derive(Debug, Clone, PartialEq)]
pub struct FontMetrics {
    first_char: u32,
    widths: Vec<f32>,
    missing_width: f32,
    /// `(first, last, width)` ranges from a CID font's `/W`.
    cid_widths: Vec<(u32, u32, f32)>,
    two_byte: bool,
}

impl FontMetrics {
    /// Used for fonts the page does not declare.
    pub fn fallback() -> Self {
        standard_metrics("Helvetica")
    }

    /// Bytes per character code.
    pub fn code_length(&self) -> usize {
        if self.two_byte {
            2
        } else {
            1
        }
    }

    pub fn width(&self, code: u32) -> f32 {
        if self.two_byte {
            return self
                .cid_widths
                .iter()
                .find(|(first, last, _)| (*first..=*last).contains(&code))
                .map_or(self.missing_width, |range| range.2);
        }
        code.checked_sub(self.first_char)
            .and_then(|i| self.widths.get(i as usize))
            .copied()
            .unwrap_or(self.missing_width)
    }
}

/// Metrics of every font in a Resources dictionary.
pub fn load_fonts(doc: &Document, resources: Option<&Dictionary>) -> FontMap {
    let mut fonts = FontMap::new();
    let Some(font_dict) = resources
        .and_then(|r| r.get(b"Font").ok())
        .and_then(|f| resolve(doc, f).as_dict().ok())
    else {
        return fonts;
    };

    for (name, obj) in font_dict.iter() {
        if let Ok(font) = resolve(doc, obj).as_dict() {
            fonts.insert(name.clone(), font_metrics(doc, font));
        }
    }
    fonts
}

pub fn font_metrics(doc: &Document, font: &Dictionary) -> FontMetrics {
    if font.get(b"Subtype").and_then(Object::as_name).ok() == Some(b"Type0".as_slice()) {
        return cid_metrics(doc, font);
    }

    let widths: Vec<f32> = font
        .get(b"Widths")
        .ok()
        .and_then(|w| resolve(doc, w).as_array().ok())
        .map(|arr| {
            arr.iter()
                .map(|w| get_number(resolve(doc, w)).unwrap_or(0.0))
                .collect()
        })
        .unwrap_or_default();

    if widths.is_empty() {
        let base_font = font
            .get(b"BaseFont")
            .and_then(Object::as_name)
            .map(|n| String::from_utf8_lossy(n).into_owned())
            .unwrap_or_default();
        return standard_metrics(&base_font);
    }

    let first_char = number(doc, font, b"FirstChar").unwrap_or(0.0).max(0.0) as u32;
    let missing_width = font
        .get(b"FontDescriptor")
        .ok()
        .and_then(|d| resolve(doc, d).as_dict().ok())
        .and_then(|d| number(doc, d, b"MissingWidth"))
        .unwrap_or(0.0);

    FontMetrics {
        first_char,
        widths,
        missing_width,
        cid_widths: Vec::new(),
        two_byte: false,
    }
}

fn number(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<f32> {
    dict.get(key).ok().and_then(|o| get_number(resolve(doc, o)))
}

fn cid_metrics(doc: &Document, font: &Dictionary) -> FontMetrics {
    let descendant = font
        .get(b"DescendantFonts")
        .ok()
        .and_then(|d| resolve(doc, d).as_array().ok())
        .and_then(|fonts| fonts.first())
        .and_then(|d| resolve(doc, d).as_dict().ok());

    let default_width = descendant
        .and_then(|d| number(doc, d, b"DW"))
        .unwrap_or(1000.0);
    let cid_widths = descendant
        .and_then(|d| d.get(b"W").ok())
        .and_then(|w| resolve(doc, w).as_array().ok())
        .map(|w| parse_cid_widths(doc, w))
        .unwrap_or_default();

    FontMetrics {
        first_char: 0,
        widths: Vec::new(),
        missing_width: default_width,
        cid_widths,
        two_byte: true,
    }
}

/// Parses `/W`: `c [w1 w2 ...]` lists and `cfirst clast w` ranges.
fn parse_cid_widths(doc: &Document, entries: &[Object]) -> Vec<(u32, u32, f32)> {
    let mut ranges = Vec::new();
    let mut i = 0;
    while i < entries.len() {
        let Some(first) = get_number(resolve(doc, &entries[i])) else {
            i += 1;
            continue;
        };
        let first = first as u32;

        match entries.get(i + 1).map(|o| resolve(doc, o)) {
            Some(Object::Array(widths)) => {
                for (offset, width) in widths.iter().enumerate() {
                    if let Some(width) = get_number(resolve(doc, width)) {
                        let cid = first + offset as u32;
                        ranges.push((cid, cid, width));
                    }
                }
                i += 2;
            }
            Some(last) => {
                let width = entries.get(i + 2).and_then(|o| get_number(resolve(doc, o)));
                let (Some(last), Some(width)) = (get_number(last), width) else {
                    break;
                };
                ranges.push((first, last as u32, width));
                i += 3;
            }
            None => break,
        }
    }
    ranges
}

/// Standard 14 metrics by base font name, ignoring a subset prefix. Bold and
/// italic faces use their family's regular widths.
fn standard_metrics(base_font: &str) -> FontMetrics {
    let name = base_font.split_once('+').map_or(base_font, |(_, n)| n);
    let (widths, missing_width) = if name.starts_with("Courier") {
        (vec![COURIER_WIDTH; 95], COURIER_WIDTH)
    } else if name.starts_with("Times") {
        (TIMES_ROMAN_WIDTHS.iter().map(|&w| w as f32).collect(), 500.0)
    } else {
        (HELVETICA_WIDTHS.iter().map(|&w| w as f32).collect(), 556.0)
    };

    FontMetrics {
        first_char: 32,
        widths,
        missing_width,
        cid_widths: Vec::new(),
        two_byte: false,
    }
}
