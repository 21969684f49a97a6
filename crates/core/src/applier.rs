//! Redaction Applier
//!
//! Registers one opaque-fill annotation per rectangle, then commits the
//! page once. Registration for a page always precedes its single commit.

use crate::document::{RedactableDocument, RedactionAnnotation};
use crate::geometry::{Fill, Rect};
use crate::resolver::Resolution;
use crate::Result;

#[derive(Debug, Clone, Copy, Default)]
pub struct RedactionApplier {
    fill: Fill,
}

impl RedactionApplier {
    pub fn new(fill: Fill) -> Self {
        Self { fill }
    }

    pub fn fill(&self) -> Fill {
        self.fill
    }

    /// Adds a pending annotation for every rectangle that lies within
    /// `bounds`. Returns how many were registered.
    pub fn register<D>(
        &self,
        doc: &mut D,
        page: usize,
        rects: &[Rect],
        bounds: &Rect,
    ) -> Result<usize>
    where
        D: RedactableDocument + ?Sized,
    {
        let mut registered = 0;
        for rect in rects {
            let Some(rect) = rect.clamp_to(bounds) else {
                log::warn!("[Applier] page {}: dropping rect outside the page: {:?}", page, rect);
                continue;
            };
            doc.add_annotation(
                page,
                RedactionAnnotation {
                    rect,
                    fill: self.fill,
                },
            )?;
            registered += 1;
        }
        Ok(registered)
    }

    /// Commits the page's pending annotations. Irreversible; any index built
    /// for the page before this call is stale afterwards.
    pub fn commit<D>(&self, doc: &mut D, page: usize) -> Result<usize>
    where
        D: RedactableDocument + ?Sized,
    {
        if doc.pending_annotations(page) == 0 {
            return Ok(0);
        }
        let applied = doc.commit_page(page)?;
        log::info!("[Applier] page {}: committed {} redaction(s)", page, applied);
        Ok(applied)
    }

    /// Registers every resolved rectangle of a page, then commits once.
    pub fn apply<D>(
        &self,
        doc: &mut D,
        page: usize,
        resolutions: &[Resolution],
        bounds: &Rect,
    ) -> Result<usize>
    where
        D: RedactableDocument + ?Sized,
    {
        for resolution in resolutions {
            self.register(doc, page, &resolution.rects, bounds)?;
        }
        self.commit(doc, page)
    }
}
