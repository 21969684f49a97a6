//! In-memory document and scripted oracles for unit tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use crate::controller::CancelToken;
use crate::document::{
    ImageResourceId, PageContent, PageImage, RedactableDocument, RedactionAnnotation, TextSource,
};
use crate::geometry::Rect;
use crate::index::{PageExtraction, RawSpan, Word};
use crate::oracle::{OracleError, OracleReply, TextOracle, VisionOracle};
use crate::target::RedactionTarget;
use crate::{CoreError, Result};

const PAGE: Rect = Rect {
    x0: 0.0,
    y0: 0.0,
    x1: 612.0,
    y1: 792.0,
};

struct MemoryPage {
    lines: Vec<Vec<Word>>,
    pending: Vec<RedactionAnnotation>,
    images: Vec<PageImage>,
    blackened: Vec<Rect>,
    source: TextSource,
    reads: usize,
}

impl MemoryPage {
    fn text(&self) -> String {
        self.lines
            .iter()
            .filter(|line| !line.is_empty())
            .map(|line| join_words(line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn join_words(words: &[Word]) -> String {
    words.iter().map(|w| w.text.as_str()).collect::<Vec<_>>().join(" ")
}

/// Lines of words on fixed-size pages. Committing removes every word a
/// redaction rectangle touches, like glyph removal in a real backend.
pub struct MemoryDocument {
    pages: Vec<MemoryPage>,
    searches: Cell<usize>,
    commits: usize,
}

impl MemoryDocument {
    pub fn from_pages(pages: &[&[&str]]) -> Self {
        let pages = pages
            .iter()
            .map(|lines| MemoryPage {
                lines: lines
                    .iter()
                    .enumerate()
                    .map(|(row, line)| {
                        let y = 50.0 + 20.0 * row as f32;
                        let mut x = 50.0;
                        line.split_whitespace()
                            .map(|text| {
                                let width = 7.0 * text.chars().count() as f32;
                                let word = Word {
                                    text: text.to_string(),
                                    bbox: Rect::from_xywh(x, y, width, 12.0),
                                };
                                x += width + 5.0;
                                word
                            })
                            .collect()
                    })
                    .collect(),
                pending: Vec::new(),
                images: Vec::new(),
                blackened: Vec::new(),
                source: TextSource::TextLayer,
                reads: 0,
            })
            .collect();
        Self {
            pages,
            searches: Cell::new(0),
            commits: 0,
        }
    }

    pub fn with_ocr_page(mut self, page: usize) -> Self {
        self.pages[page].source = TextSource::Ocr;
        self
    }

    pub fn with_image(
        mut self,
        page: usize,
        resource: ImageResourceId,
        placement: Option<Rect>,
    ) -> Self {
        self.pages[page].images.push(PageImage {
            resource,
            name: format!("Im{}", resource),
            placement,
        });
        self
    }

    pub fn bounds(&self, _page: usize) -> Rect {
        PAGE
    }

    pub fn word_rect(&self, page: usize, text: &str) -> Rect {
        self.pages[page]
            .lines
            .iter()
            .flatten()
            .find(|w| w.text == text)
            .map(|w| w.bbox)
            .unwrap_or_else(|| panic!("no word {:?} on page {}", text, page))
    }

    pub fn page_text(&self, page: usize) -> String {
        self.pages[page].text()
    }

    pub fn reads(&self, page: usize) -> usize {
        self.pages[page].reads
    }

    pub fn commits(&self) -> usize {
        self.commits
    }

    pub fn searches(&self) -> usize {
        self.searches.get()
    }

    pub fn blackened(&self, page: usize) -> Vec<Rect> {
        self.pages[page].blackened.clone()
    }

    fn page(&self, page: usize) -> Result<&MemoryPage> {
        self.pages.get(page).ok_or(CoreError::PageOutOfRange(page))
    }

    fn page_mut(&mut self, page: usize) -> Result<&mut MemoryPage> {
        self.pages.get_mut(page).ok_or(CoreError::PageOutOfRange(page))
    }
}

impl RedactableDocument for MemoryDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_bounds(&self, page: usize) -> Result<Rect> {
        self.page(page).map(|_| PAGE)
    }

    fn read_page(&mut self, page: usize) -> Result<PageContent> {
        let p = self.page_mut(page)?;
        p.reads += 1;

        let mut extraction = PageExtraction::default();
        for line in p.lines.iter().filter(|l| !l.is_empty()) {
            if let Some(bbox) = Rect::union_all(line.iter().map(|w| &w.bbox)) {
                extraction.spans.push(RawSpan {
                    text: join_words(line),
                    bbox,
                });
            }
            extraction.words.extend(line.iter().cloned());
        }

        Ok(PageContent {
            index: page,
            bounds: PAGE,
            text: p.text(),
            extraction,
            source: p.source,
        })
    }

    fn supports_native_search(&self) -> bool {
        true
    }

    fn search_page(&self, page: usize, needles: &[String]) -> Result<Vec<Vec<Rect>>> {
        self.searches.set(self.searches.get() + 1);
        let p = self.page(page)?;

        let mut results = Vec::with_capacity(needles.len());
        for needle in needles {
            let mut rects = Vec::new();
            for line in &p.lines {
                let text = join_words(line);
                let mut ranges = Vec::with_capacity(line.len());
                let mut at = 0;
                for word in line {
                    ranges.push((at, at + word.text.len()));
                    at += word.text.len() + 1;
                }
                for (start, found) in text.match_indices(needle.as_str()) {
                    let end = start + found.len();
                    let hit = line
                        .iter()
                        .zip(&ranges)
                        .filter(|(_, (s, e))| *s < end && start < *e)
                        .map(|(w, _)| &w.bbox);
                    if let Some(rect) = Rect::union_all(hit) {
                        rects.push(rect);
                    }
                }
            }
            results.push(rects);
        }
        Ok(results)
    }

    fn add_annotation(&mut self, page: usize, annotation: RedactionAnnotation) -> Result<()> {
        self.page_mut(page)?.pending.push(annotation);
        Ok(())
    }

    fn pending_annotations(&self, page: usize) -> usize {
        self.pages.get(page).map_or(0, |p| p.pending.len())
    }

    fn commit_page(&mut self, page: usize) -> Result<usize> {
        let p = self.page_mut(page)?;
        let pending = std::mem::take(&mut p.pending);

        for line in &mut p.lines {
            line.retain(|w| !pending.iter().any(|a| a.rect.intersects(&w.bbox)));
        }
        for image in &p.images {
            if let Some(placement) = image.placement {
                let hit = pending.iter().any(|a| a.rect.intersects(&placement));
                if hit && !p.blackened.contains(&placement) {
                    p.blackened.push(placement);
                }
            }
        }

        self.commits += 1;
        Ok(pending.len())
    }

    fn page_images(&self, page: usize) -> Result<Vec<PageImage>> {
        Ok(self.page(page)?.images.clone())
    }

    fn image_png(&self, resource: ImageResourceId) -> Result<Vec<u8>> {
        let known = self
            .pages
            .iter()
            .flat_map(|p| &p.images)
            .any(|i| i.resource == resource);
        if known {
            Ok(vec![0x89, b'P', b'N', b'G', resource as u8])
        } else {
            Err(CoreError::Document(format!("unknown image {}", resource)))
        }
    }
}

/// Replays canned replies in order; an empty reply once they run out.
pub struct ScriptedOracle {
    replies: RefCell<VecDeque<std::result::Result<&'static str, OracleError>>>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedOracle {
    pub fn new(replies: Vec<std::result::Result<&'static str, OracleError>>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Page texts the oracle was asked about, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl TextOracle for ScriptedOracle {
    fn identify(
        &self,
        page_text: &str,
        _specification: &str,
    ) -> std::result::Result<OracleReply, OracleError> {
        self.calls.borrow_mut().push(page_text.to_string());
        match self.replies.borrow_mut().pop_front() {
            Some(Ok(content)) => OracleReply::parse(content),
            Some(Err(e)) => Err(e),
            None => Ok(OracleReply::default()),
        }
    }
}

/// Flags every keyword present in the page text, plus fixed claims that are
/// returned whether or not they occur.
pub struct KeywordOracle {
    keywords: Vec<String>,
    claims: Vec<String>,
    calls: Cell<usize>,
    cancel: Option<(usize, CancelToken)>,
}

impl KeywordOracle {
    pub fn new(keywords: &[&str]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            claims: Vec::new(),
            calls: Cell::new(0),
            cancel: None,
        }
    }

    pub fn always_claim(mut self, text: &str) -> Self {
        self.claims.push(text.to_string());
        self
    }

    /// Trips `token` once `calls` pages have been answered.
    pub fn cancel_after(mut self, calls: usize, token: CancelToken) -> Self {
        self.cancel = Some((calls, token));
        self
    }
}

impl TextOracle for KeywordOracle {
    fn identify(
        &self,
        page_text: &str,
        _specification: &str,
    ) -> std::result::Result<OracleReply, OracleError> {
        self.calls.set(self.calls.get() + 1);
        if let Some((after, token)) = &self.cancel {
            if self.calls.get() >= *after {
                token.cancel();
            }
        }

        let targets = self
            .keywords
            .iter()
            .filter(|k| page_text.contains(k.as_str()))
            .chain(&self.claims)
            .map(|t| RedactionTarget::new(t.as_str()))
            .collect();
        Ok(OracleReply::new(targets))
    }
}

/// Vision counterpart of [`ScriptedOracle`].
pub struct ScriptedVision {
    replies: RefCell<VecDeque<std::result::Result<&'static str, OracleError>>>,
    calls: RefCell<Vec<usize>>,
}

impl ScriptedVision {
    pub fn new(replies: Vec<std::result::Result<&'static str, OracleError>>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Sizes of the PNGs submitted, in order.
    pub fn calls(&self) -> Vec<usize> {
        self.calls.borrow().clone()
    }
}

impl VisionOracle for ScriptedVision {
    fn inspect_image(
        &self,
        png: &[u8],
        _specification: &str,
    ) -> std::result::Result<OracleReply, OracleError> {
        self.calls.borrow_mut().push(png.len());
        match self.replies.borrow_mut().pop_front() {
            Some(Ok(content)) => OracleReply::parse_vision(content),
            Some(Err(e)) => Err(e),
            None => Ok(OracleReply::default()),
        }
    }
}
