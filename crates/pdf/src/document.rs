//! [`RedactableDocument`] over pdfium (reading, search, rendering) and lopdf
//! (editing).
//!
//! lopdf holds the document being edited. Every read loads the current bytes
//! into pdfium again, so extraction always reflects the commits made so far.

use std::collections::BTreeMap;
use std::path::Path;

use blackline_core::{
    CoreError, ImageResourceId, PageContent, PageImage, RedactableDocument, RedactionAnnotation,
    Rect, TextSource,
};
use blackline_ocr::OcrEngine;
use lopdf::Document;
use pdfium_render::prelude::*;
use serde::{Deserialize, Serialize};

use crate::extract::{extract_ocr, extract_text_layer, search_text_layer};
use crate::redact::{apply_annotations, page_images, serialize};
use crate::utils::{get_page_box, get_page_id, PageBox};
use crate::{image, PdfError};

/// When pages are read through OCR instead of their text layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrMode {
    /// Text layer only.
    Off,
    /// OCR pages whose text layer is empty.
    #[default]
    Auto,
    /// OCR every page.
    Always,
}

pub const DEFAULT_OCR_DPI: u32 = 400;

pub struct PdfRedactionDocument<'p> {
    pdfium: &'p Pdfium,
    doc: Document,
    bytes: Vec<u8>,
    page_count: usize,
    pending: BTreeMap<usize, Vec<RedactionAnnotation>>,
    ocr: Option<Box<dyn OcrEngine>>,
    ocr_mode: OcrMode,
    dpi: u32,
}

impl<'p> PdfRedactionDocument<'p> {
    pub fn open(pdfium: &'p Pdfium, path: &Path) -> Result<Self, PdfError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(pdfium, bytes)
    }

    pub fn from_bytes(pdfium: &'p Pdfium, bytes: Vec<u8>) -> Result<Self, PdfError> {
        let doc = Document::load_mem(&bytes)?;
        if doc.is_encrypted() {
            return Err(PdfError::Encrypted);
        }
        let page_count = doc.get_pages().len();

        Ok(Self {
            pdfium,
            doc,
            bytes,
            page_count,
            pending: BTreeMap::new(),
            ocr: None,
            ocr_mode: OcrMode::Off,
            dpi: DEFAULT_OCR_DPI,
        })
    }

    /// Enables OCR with the given engine.
    pub fn with_ocr(mut self, engine: Box<dyn OcrEngine>, mode: OcrMode, dpi: u32) -> Self {
        self.ocr = Some(engine);
        self.ocr_mode = mode;
        self.dpi = dpi.max(72);
        self
    }

    /// Current state of the document, every commit included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Writes the current state as is.
    pub fn write_to(&self, path: &Path) -> Result<(), PdfError> {
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }

    /// Compresses all streams and writes the final document.
    pub fn save(&mut self, path: &Path) -> Result<(), PdfError> {
        self.doc.compress();
        self.bytes = serialize(&mut self.doc)?;
        self.write_to(path)
    }

    fn page_box(&self, page: usize) -> Result<PageBox, PdfError> {
        Ok(get_page_box(&self.doc, get_page_id(&self.doc, page)?))
    }

    fn check_page(&self, page: usize) -> blackline_core::Result<()> {
        if page >= self.page_count {
            return Err(CoreError::PageOutOfRange(page));
        }
        Ok(())
    }

    fn load(&self) -> Result<PdfDocument<'_>, PdfError> {
        self.pdfium
            .load_pdf_from_byte_slice(&self.bytes, None)
            .map_err(|e| PdfError::Pdfium(e.to_string()))
    }
}

fn page_index(page: usize) -> Result<u16, PdfError> {
    u16::try_from(page).map_err(|_| PdfError::PageNotFound(page))
}

fn pdfium_page_error(page: usize) -> impl Fn(PdfiumError) -> PdfError {
    move |e| PdfError::Pdfium(format!("page {}: {}", page, e))
}

impl RedactableDocument for PdfRedactionDocument<'_> {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page_bounds(&self, page: usize) -> blackline_core::Result<Rect> {
        self.check_page(page)?;
        Ok(self.page_box(page)?.bounds())
    }

    fn read_page(&mut self, page: usize) -> blackline_core::Result<PageContent> {
        self.check_page(page)?;
        let page_box = self.page_box(page)?;

        let document = self
            .pdfium
            .load_pdf_from_byte_slice(&self.bytes, None)
            .map_err(|e| PdfError::Pdfium(e.to_string()))?;
        let pdf_page = document
            .pages()
            .get(page_index(page)?)
            .map_err(pdfium_page_error(page))?;
        let (text, extraction) = extract_text_layer(&pdf_page, &page_box)?;

        let wants_ocr = match self.ocr_mode {
            OcrMode::Off => false,
            OcrMode::Auto => text.trim().is_empty(),
            OcrMode::Always => true,
        };

        if let (true, Some(engine)) = (wants_ocr, self.ocr.as_deref_mut()) {
            match extract_ocr(&pdf_page, &page_box, self.dpi, engine) {
                Ok((text, extraction)) => {
                    log::info!(
                        "[Read] page {}: OCR found {} word(s)",
                        page,
                        extraction.words.len()
                    );
                    return Ok(PageContent {
                        index: page,
                        bounds: page_box.bounds(),
                        text,
                        extraction,
                        source: TextSource::Ocr,
                    });
                }
                Err(e) => {
                    log::error!("[Read] page {}: OCR failed, using the text layer: {}", page, e)
                }
            }
        }

        log::debug!(
            "[Read] page {}: {} span(s), {} word(s)",
            page,
            extraction.spans.len(),
            extraction.words.len()
        );
        Ok(PageContent {
            index: page,
            bounds: page_box.bounds(),
            text,
            extraction,
            source: TextSource::TextLayer,
        })
    }

    fn supports_native_search(&self) -> bool {
        true
    }

    fn search_page(
        &self,
        page: usize,
        needles: &[String],
    ) -> blackline_core::Result<Vec<Vec<Rect>>> {
        self.check_page(page)?;
        let page_box = self.page_box(page)?;
        let document = self.load()?;
        let pdf_page = document
            .pages()
            .get(page_index(page)?)
            .map_err(pdfium_page_error(page))?;
        Ok(search_text_layer(&pdf_page, &page_box, needles)?)
    }

    fn add_annotation(
        &mut self,
        page: usize,
        annotation: RedactionAnnotation,
    ) -> blackline_core::Result<()> {
        self.check_page(page)?;
        self.pending.entry(page).or_default().push(annotation);
        Ok(())
    }

    fn pending_annotations(&self, page: usize) -> usize {
        self.pending.get(&page).map_or(0, Vec::len)
    }

    fn commit_page(&mut self, page: usize) -> blackline_core::Result<usize> {
        self.check_page(page)?;
        let annotations = self.pending.remove(&page).unwrap_or_default();
        if annotations.is_empty() {
            return Ok(0);
        }

        let stats = apply_annotations(&mut self.doc, page, &annotations)?;
        self.bytes = serialize(&mut self.doc)?;

        log::info!(
            "[Commit] page {}: {} annotation(s), {} glyph(s) removed, {} image(s) rewritten",
            page,
            stats.annotations,
            stats.glyphs_removed,
            stats.images_rewritten
        );
        Ok(stats.annotations)
    }

    fn page_images(&self, page: usize) -> blackline_core::Result<Vec<PageImage>> {
        self.check_page(page)?;
        Ok(page_images(&self.doc, page)?)
    }

    fn image_png(&self, resource: ImageResourceId) -> blackline_core::Result<Vec<u8>> {
        Ok(image::image_png(&self.doc, resource)?)
    }
}
