//! Document interface shared by every backend.
//!
//! The controller and redactors only talk to a [`RedactableDocument`]; the PDF
//! backend implements it on top of pdfium and lopdf, tests implement it in
//! memory.

use serde::{Deserialize, Serialize};

use crate::geometry::{Fill, Rect};
use crate::index::PageExtraction;
use crate::resolver::TextSearch;
use crate::Result;

/// Where a page's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    /// Embedded text layer; the backend's native search applies.
    TextLayer,
    /// OCR over the rendered page; only offset reconstruction applies.
    Ocr,
}

/// One fresh read of a page.
#[derive(Debug, Clone)]
pub struct PageContent {
    /// Zero-based page index.
    pub index: usize,
    /// Page box in page space; every redaction rectangle is clipped to it.
    pub bounds: Rect,
    /// Plain text handed to the oracle.
    pub text: String,
    pub extraction: PageExtraction,
    pub source: TextSource,
}

/// A pending opaque fill on a page. Nothing changes on the page until the
/// page is committed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RedactionAnnotation {
    pub rect: Rect,
    pub fill: Fill,
}

/// Identity of an embedded image resource (the PDF object number).
pub type ImageResourceId = u32;

/// An image resource referenced by a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageImage {
    pub resource: ImageResourceId,
    /// Resource name in the page's XObject dictionary.
    pub name: String,
    /// Where the image is drawn, if the content stream places it.
    pub placement: Option<Rect>,
}

/// Unified document interface.
///
/// Reading, annotating and committing are page-scoped. A page must be
/// committed before it is read again: extraction is not valid against a page
/// with uncommitted annotations.
pub trait RedactableDocument {
    fn page_count(&self) -> usize;

    /// Page box in page space, without extracting any text.
    fn page_bounds(&self, page: usize) -> Result<Rect>;

    /// Extracts the page's text and geometry. Never cached: every call
    /// reflects all commits made so far.
    fn read_page(&mut self, page: usize) -> Result<PageContent>;

    /// Whether [`RedactableDocument::search_page`] is backed by a native,
    /// layout-aware search on text-layer pages.
    fn supports_native_search(&self) -> bool;

    /// Native exact search. Returns, for every needle, the rectangles of all
    /// its occurrences on the page (empty when it does not occur).
    fn search_page(&self, page: usize, needles: &[String]) -> Result<Vec<Vec<Rect>>>;

    fn add_annotation(&mut self, page: usize, annotation: RedactionAnnotation) -> Result<()>;

    fn pending_annotations(&self, page: usize) -> usize;

    /// Applies every pending annotation of the page irreversibly and clears
    /// them. Returns how many annotations were applied.
    fn commit_page(&mut self, page: usize) -> Result<usize>;

    /// Raster images referenced by the page.
    fn page_images(&self, page: usize) -> Result<Vec<PageImage>>;

    /// PNG encoding of an image resource, for the vision oracle.
    fn image_png(&self, resource: ImageResourceId) -> Result<Vec<u8>>;
}

/// Native search bound to one page of a document.
pub struct PageSearch<'a, D: RedactableDocument + ?Sized> {
    doc: &'a D,
    page: usize,
}

impl<'a, D: RedactableDocument + ?Sized> PageSearch<'a, D> {
    pub fn new(doc: &'a D, page: usize) -> Self {
        Self { doc, page }
    }
}

impl<D: RedactableDocument + ?Sized> TextSearch for PageSearch<'_, D> {
    fn search(&self, needles: &[String]) -> Result<Vec<Vec<Rect>>> {
        self.doc.search_page(self.page, needles)
    }
}
