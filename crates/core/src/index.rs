//! Page Text Index
//!
//! Converts a page's raw extraction payload into positioned spans and words
//! plus the offset-tracked whole-page string used by phrase search. Spans are
//! joined with exactly one [`SPAN_SEPARATOR`] per boundary and consecutive
//! whitespace is left as is, so a span boundary always costs one byte of
//! offset. Callers that need normalized text normalize it themselves.

use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

/// Inserted between consecutive spans in the whole-page string.
pub const SPAN_SEPARATOR: char = '\n';

/// A run of text as produced by the page extractor, before indexing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSpan {
    pub text: String,
    pub bbox: Rect,
}

/// A word with its bounding box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub bbox: Rect,
}

/// Raw extraction output for one page, in extraction order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageExtraction {
    pub spans: Vec<RawSpan>,
    pub words: Vec<Word>,
}

/// An indexed span: `full_text[start..end] == text`. Offsets are byte offsets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSpan {
    pub text: String,
    pub bbox: Rect,
    pub start: usize,
    pub end: usize,
}

impl TextSpan {
    /// Half-open interval overlap with `[start, end)`.
    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        self.start < end && start < self.end
    }
}

/// Positioned representation of one page's text.
///
/// Derived fresh from each extraction; after a commit the page's text changes
/// and any index built before it is stale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageTextIndex {
    pub spans: Vec<TextSpan>,
    pub words: Vec<Word>,
    pub full_text: String,
}

impl PageTextIndex {
    /// Builds the index. Spans whose text is empty or whitespace-only are
    /// skipped without consuming a separator, so emitted spans stay
    /// contiguous in offset space.
    pub fn build(extraction: &PageExtraction) -> Self {
        let mut spans = Vec::with_capacity(extraction.spans.len());
        let mut full_text = String::new();

        for raw in &extraction.spans {
            if raw.text.trim().is_empty() {
                continue;
            }
            if !spans.is_empty() {
                full_text.push(SPAN_SEPARATOR);
            }
            let start = full_text.len();
            full_text.push_str(&raw.text);
            spans.push(TextSpan {
                text: raw.text.clone(),
                bbox: raw.bbox,
                start,
                end: full_text.len(),
            });
        }

        let words = extraction
            .words
            .iter()
            .filter(|w| !w.text.trim().is_empty())
            .cloned()
            .collect();

        Self {
            spans,
            words,
            full_text,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty() && self.words.is_empty()
    }

    /// Spans overlapping `[start, end)` of the whole-page string.
    pub fn spans_overlapping(&self, start: usize, end: usize) -> Vec<&TextSpan> {
        self.spans.iter().filter(|s| s.overlaps(start, end)).collect()
    }

    /// Words lying inside `span`, judged by the word's centre point.
    pub fn words_in(&self, span: &TextSpan) -> Vec<&Word> {
        self.words
            .iter()
            .filter(|w| {
                let (cx, cy) = w.bbox.center();
                span.bbox.contains_point(cx, cy)
            })
            .collect()
    }
}
