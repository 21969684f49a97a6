//! Phrase Resolver
//!
//! Turns an oracle target into the rectangles to redact. Single words are
//! matched by substring against the page's words. Phrases go through a
//! sliding-window decomposition and the backend's native search; pages
//! without native search (OCR) fall back to reconstructing rectangles from
//! the offset-indexed spans.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::geometry::Rect;
use crate::index::{PageTextIndex, TextSpan};
use crate::target::{Granularity, RedactionTarget};
use crate::Result;

/// Default number of words per search chunk.
pub const DEFAULT_WINDOW: usize = 10;

/// Exact, layout-aware substring search provided by the page backend.
pub trait TextSearch {
    /// For each needle, the rectangles of all its occurrences on the page.
    fn search(&self, needles: &[String]) -> Result<Vec<Vec<Rect>>>;
}

/// How a target's rectangles were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Substring match inside individual words.
    WordScan,
    /// Substring match inside spans, for extractors without word boxes.
    SpanScan,
    /// Chunked native search.
    NativeSearch,
    /// Offset reconstruction inside one span, tightened to the phrase's words.
    SingleSpan,
    /// Offset reconstruction across spans, union of span boxes.
    MultiSpan,
}

/// Why a target produced no rectangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Miss {
    /// The text does not occur on the page.
    NotFound,
    /// It occurs, but every rectangle fell outside the page box.
    Geometry,
}

/// Outcome of resolving one target on one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub target: RedactionTarget,
    pub rects: Vec<Rect>,
    pub strategy: Option<Strategy>,
    /// Search chunks tried (phrase path) and how many of them matched.
    pub chunks: usize,
    pub matched_chunks: usize,
    pub miss: Option<Miss>,
}

impl Resolution {
    fn new(target: &RedactionTarget) -> Self {
        Self {
            target: target.clone(),
            rects: Vec::new(),
            strategy: None,
            chunks: 0,
            matched_chunks: 0,
            miss: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !self.rects.is_empty()
    }
}

/// Everything the resolver may look at for one page.
pub struct PageQuery<'a> {
    pub index: &'a PageTextIndex,
    pub bounds: Rect,
    /// Native search; `None` when the page has none (e.g. OCR pages).
    pub search: Option<&'a dyn TextSearch>,
}

/// Strategy interface for locating targets on a page.
pub trait PhraseResolver {
    fn resolve(&self, page: &PageQuery<'_>, target: &RedactionTarget) -> Resolution;
}

/// Chunked sliding-window resolver.
#[derive(Debug, Clone)]
pub struct SlidingWindowResolver {
    window: usize,
}

impl Default for SlidingWindowResolver {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
        }
    }
}

impl SlidingWindowResolver {
    /// Window sizes below 2 are raised to 2 so the stride stays positive.
    pub fn with_window(window: usize) -> Self {
        Self {
            window: window.max(2),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    fn resolve_word(&self, page: &PageQuery<'_>, target: &RedactionTarget) -> Resolution {
        let mut resolution = Resolution::new(target);
        let needle = target.text.trim();
        if needle.is_empty() {
            return resolution;
        }

        if page.index.words.is_empty() {
            resolution.strategy = Some(Strategy::SpanScan);
            resolution.rects = page
                .index
                .spans
                .iter()
                .filter(|s| s.text.contains(needle))
                .map(|s| s.bbox)
                .collect();
        } else {
            resolution.strategy = Some(Strategy::WordScan);
            resolution.rects = page
                .index
                .words
                .iter()
                .filter(|w| w.text.contains(needle))
                .map(|w| w.bbox)
                .collect();
        }
        resolution
    }

    fn resolve_native(
        &self,
        search: &dyn TextSearch,
        target: &RedactionTarget,
    ) -> Resolution {
        let mut resolution = Resolution::new(target);
        resolution.strategy = Some(Strategy::NativeSearch);

        let chunks = chunk_phrase(&normalize_quotes(&target.text), self.window);
        resolution.chunks = chunks.len();

        match search.search(&chunks) {
            Ok(found) => {
                for (chunk, rects) in chunks.iter().zip(found) {
                    if rects.is_empty() {
                        log::debug!("[Resolver] chunk not found: {:?}", chunk);
                        continue;
                    }
                    resolution.matched_chunks += 1;
                    resolution.rects.extend(rects);
                }
            }
            Err(e) => {
                log::warn!("[Resolver] native search failed for '{}': {}", target.text, e);
            }
        }
        resolution
    }

    fn resolve_offsets(&self, page: &PageQuery<'_>, target: &RedactionTarget) -> Resolution {
        let mut resolution = Resolution::new(target);
        let needle = collapse_whitespace(&normalize_quotes(&target.text));
        if needle.is_empty() {
            return resolution;
        }

        let index = page.index;
        let haystack = NormalizedText::new(&index.full_text);
        let tokens: HashSet<&str> = needle
            .split(' ')
            .map(trim_punctuation)
            .filter(|t| !t.is_empty())
            .collect();

        let mut cursor = 0;
        while let Some(pos) = haystack.text[cursor..].find(&needle) {
            let found = cursor + pos;
            cursor = found + needle.len();

            let (start, end) = haystack.original_range(&index.full_text, found, cursor);
            let spans = index.spans_overlapping(start, end);
            match spans.as_slice() {
                [] => {}
                [span] => {
                    resolution.rects.push(tighten_to_words(index, span, &tokens));
                    resolution.strategy.get_or_insert(Strategy::SingleSpan);
                }
                many => {
                    if let Some(bbox) = Rect::union_all(many.iter().map(|s| &s.bbox)) {
                        resolution.rects.push(bbox);
                        resolution.strategy.get_or_insert(Strategy::MultiSpan);
                    }
                }
            }
        }
        resolution
    }
}

impl PhraseResolver for SlidingWindowResolver {
    fn resolve(&self, page: &PageQuery<'_>, target: &RedactionTarget) -> Resolution {
        let mut resolution = match (target.granularity, page.search) {
            (Granularity::Word, _) => self.resolve_word(page, target),
            (Granularity::Phrase, Some(search)) => self.resolve_native(search, target),
            (Granularity::Phrase, None) => self.resolve_offsets(page, target),
        };

        let found_any = !resolution.rects.is_empty();
        resolution.rects = resolution
            .rects
            .iter()
            .filter_map(|r| r.clamp_to(&page.bounds))
            .collect();

        if resolution.rects.is_empty() {
            resolution.miss = Some(if found_any { Miss::Geometry } else { Miss::NotFound });
            match target.granularity {
                Granularity::Word => {
                    log::warn!("[Resolver] Word '{}' could not be found on the page", target.text)
                }
                Granularity::Phrase => {
                    log::warn!("[Resolver] Phrase '{}' could not be found on the page", target.text)
                }
            }
        } else {
            log::info!(
                "[Resolver] '{}' ({}) -> {} rect(s) via {:?}: {:?}",
                target.text,
                target.granularity,
                resolution.rects.len(),
                resolution.strategy,
                resolution.rects
            );
        }
        resolution
    }
}

/// Breaks a phrase into overlapping word windows of `window` words with a
/// stride of `window / 2`, preserving order. A phrase of at most `window`
/// words comes back unchanged as the only chunk.
pub fn chunk_phrase(text: &str, window: usize) -> Vec<String> {
    let window = window.max(2);
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= window {
        return vec![text.to_string()];
    }

    let stride = window / 2;
    let mut chunks = Vec::new();
    let mut i = 0;
    loop {
        let end = (i + window).min(words.len());
        chunks.push(words[i..end].join(" "));
        if i + window >= words.len() {
            break;
        }
        i += stride;
    }
    chunks
}

fn normalize_quote(ch: char) -> char {
    match ch {
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' => '"',
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' => '\'',
        other => other,
    }
}

/// Replaces typographic quotes with their plain ASCII forms.
pub fn normalize_quotes(text: &str) -> String {
    text.chars().map(normalize_quote).collect()
}

/// Collapses whitespace runs to one space and trims the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn trim_punctuation(token: &str) -> &str {
    token.trim_matches(|c: char| !c.is_alphanumeric())
}

/// Union of the span's words that belong to the phrase; the span box when
/// none of them can be matched.
fn tighten_to_words(index: &PageTextIndex, span: &TextSpan, tokens: &HashSet<&str>) -> Rect {
    let words = index.words_in(span);
    let matching: Vec<&Rect> = words
        .iter()
        .filter(|w| {
            let token = trim_punctuation(&w.text);
            !token.is_empty() && tokens.contains(token)
        })
        .map(|w| &w.bbox)
        .collect();
    Rect::union_all(matching).unwrap_or(span.bbox)
}

/// Whitespace-collapsed, quote-normalized copy of a string that remembers
/// where each byte came from.
struct NormalizedText {
    text: String,
    /// `origin[i]` is the byte offset in the source of normalized byte `i`.
    origin: Vec<usize>,
}

impl NormalizedText {
    fn new(source: &str) -> Self {
        let mut text = String::with_capacity(source.len());
        let mut origin = Vec::with_capacity(source.len());
        let mut pending_space: Option<usize> = None;

        for (at, ch) in source.char_indices() {
            if ch.is_whitespace() {
                if !text.is_empty() && pending_space.is_none() {
                    pending_space = Some(at);
                }
                continue;
            }
            if let Some(space_at) = pending_space.take() {
                text.push(' ');
                origin.push(space_at);
            }
            let before = text.len();
            text.push(normalize_quote(ch));
            origin.extend(std::iter::repeat(at).take(text.len() - before));
        }

        Self { text, origin }
    }

    /// Maps the normalized byte range `[start, end)` back to the source.
    fn original_range(&self, source: &str, start: usize, end: usize) -> (usize, usize) {
        let first = self.origin[start];
        let last = self.origin[end - 1];
        let last_len = source[last..].chars().next().map_or(0, char::len_utf8);
        (first, last + last_len)
    }
}
