//! Image Region Redactor
//!
//! Submits every embedded raster image to the vision oracle and blacks out
//! the whole placement rectangle of flagged images. No sub-image
//! localisation is attempted.

use std::collections::HashMap;

use crate::applier::RedactionApplier;
use crate::controller::CancelToken;
use crate::document::{ImageResourceId, RedactableDocument};
use crate::geometry::Rect;
use crate::oracle::VisionOracle;
use crate::report::{ImageOutcome, ImageReport};
use crate::{CoreError, Result};

pub struct ImageRegionRedactor<'a> {
    oracle: &'a dyn VisionOracle,
    specification: &'a str,
    applier: RedactionApplier,
    cancel: CancelToken,
}

/// Verdict for one resource: the oracle's findings, or why there is none.
type Verdict = std::result::Result<Vec<String>, String>;

impl<'a> ImageRegionRedactor<'a> {
    pub fn new(oracle: &'a dyn VisionOracle, specification: &'a str) -> Self {
        Self {
            oracle,
            specification,
            applier: RedactionApplier::default(),
            cancel: CancelToken::default(),
        }
    }

    pub fn with_applier(mut self, applier: RedactionApplier) -> Self {
        self.applier = applier;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Processes every page in order. Each placement is handled on its own
    /// page; a resource drawn several times is judged once and every one of
    /// its placements is redacted.
    pub fn run<D>(&self, doc: &mut D) -> Result<Vec<ImageReport>>
    where
        D: RedactableDocument + ?Sized,
    {
        let mut reports = Vec::new();
        let mut verdicts: HashMap<ImageResourceId, Verdict> = HashMap::new();

        for page in 0..doc.page_count() {
            if self.cancel.is_cancelled() {
                return Err(CoreError::Cancelled);
            }

            let images = doc.page_images(page)?;
            if images.is_empty() {
                continue;
            }
            let bounds = doc.page_bounds(page)?;
            let mut handled: Vec<(ImageResourceId, Option<Rect>)> = Vec::new();

            for image in images {
                let key = (image.resource, image.placement);
                if handled.contains(&key) {
                    continue;
                }
                handled.push(key);

                let Some(rect) = image.placement.and_then(|r| r.clamp_to(&bounds)) else {
                    log::warn!(
                        "[Images] page {}: image {} ({}) has no placement, skipping",
                        page,
                        image.resource,
                        image.name
                    );
                    reports.push(ImageReport {
                        page,
                        resource: image.resource,
                        name: image.name,
                        outcome: ImageOutcome::Unplaced,
                    });
                    continue;
                };

                let verdict = verdicts
                    .entry(image.resource)
                    .or_insert_with(|| self.judge(&*doc, image.resource))
                    .clone();

                let outcome = match verdict {
                    Ok(findings) if findings.is_empty() => ImageOutcome::Clean,
                    Ok(findings) => {
                        log::info!(
                            "[Images] page {}: redacting image {} at {:?}: {:?}",
                            page,
                            image.resource,
                            rect,
                            findings
                        );
                        self.applier.register(doc, page, &[rect], &bounds)?;
                        ImageOutcome::Redacted { rect, findings }
                    }
                    Err(error) => ImageOutcome::Failed { error },
                };
                reports.push(ImageReport {
                    page,
                    resource: image.resource,
                    name: image.name,
                    outcome,
                });
            }

            self.applier.commit(doc, page)?;
        }

        Ok(reports)
    }

    fn judge<D>(&self, doc: &D, resource: ImageResourceId) -> Verdict
    where
        D: RedactableDocument + ?Sized,
    {
        let png = doc.image_png(resource).map_err(|e| {
            log::warn!("[Images] could not decode image {}: {}", resource, e);
            e.to_string()
        })?;
        match self.oracle.inspect_image(&png, self.specification) {
            Ok(reply) => Ok(reply.targets.into_iter().map(|t| t.text).collect()),
            Err(e) => {
                log::error!("[Images] vision oracle failed for image {}: {}", resource, e);
                Err(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::OracleError;
    use crate::testing::{MemoryDocument, ScriptedVision};

    const SPEC: &str = "Redact faces and signatures.";

    #[test]
    fn test_flagged_image_is_fully_redacted() {
        let placement = Rect::new(100.0, 100.0, 200.0, 150.0);
        let mut doc = MemoryDocument::from_pages(&[&["Signed"]]).with_image(0, 7, Some(placement));
        let vision = ScriptedVision::new(vec![Ok(r#"{"redactions": ["signature"]}"#)]);

        let reports = ImageRegionRedactor::new(&vision, SPEC).run(&mut doc).unwrap();

        assert_eq!(
            reports[0].outcome,
            ImageOutcome::Redacted {
                rect: placement,
                findings: vec!["signature".into()]
            }
        );
        assert_eq!(doc.blackened(0), vec![placement]);
        assert_eq!(doc.page_text(0), "Signed");
    }

    #[test]
    fn test_empty_list_means_clean() {
        let mut doc = MemoryDocument::from_pages(&[&["Logo"]])
            .with_image(0, 3, Some(Rect::new(0.0, 0.0, 50.0, 50.0)));
        let vision = ScriptedVision::new(vec![Ok(r#"{"redactions": []}"#)]);

        let reports = ImageRegionRedactor::new(&vision, SPEC).run(&mut doc).unwrap();
        assert_eq!(reports[0].outcome, ImageOutcome::Clean);
        assert!(doc.blackened(0).is_empty());
        assert_eq!(doc.commits(), 0);
    }

    #[test]
    fn test_unplaced_image_is_skipped() {
        let mut doc = MemoryDocument::from_pages(&[&["x"]]).with_image(0, 9, None);
        let vision = ScriptedVision::new(Vec::new());

        let reports = ImageRegionRedactor::new(&vision, SPEC).run(&mut doc).unwrap();
        assert_eq!(reports[0].outcome, ImageOutcome::Unplaced);
        assert!(vision.calls().is_empty());
    }

    #[test]
    fn test_shared_resource_is_tracked_per_page() {
        let first = Rect::new(10.0, 10.0, 60.0, 60.0);
        let second = Rect::new(300.0, 400.0, 350.0, 450.0);
        let mut doc = MemoryDocument::from_pages(&[&["one"], &["two"]])
            .with_image(0, 5, Some(first))
            .with_image(1, 5, Some(second));
        let vision = ScriptedVision::new(vec![Ok(r#"{"redactions": ["face"]}"#)]);

        let reports = ImageRegionRedactor::new(&vision, SPEC).run(&mut doc).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(vision.calls().len(), 1);
        assert_eq!(doc.blackened(0), vec![first]);
        assert_eq!(doc.blackened(1), vec![second]);
    }

    #[test]
    fn test_every_placement_on_a_page_is_redacted() {
        let left = Rect::new(10.0, 10.0, 60.0, 60.0);
        let right = Rect::new(400.0, 10.0, 450.0, 60.0);
        let mut doc = MemoryDocument::from_pages(&[&["logos"]])
            .with_image(0, 4, Some(left))
            .with_image(0, 4, Some(right))
            .with_image(0, 4, Some(right));
        let vision = ScriptedVision::new(vec![Ok(r#"{"redactions": ["logo"]}"#)]);

        let reports = ImageRegionRedactor::new(&vision, SPEC).run(&mut doc).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(vision.calls().len(), 1);
        assert_eq!(doc.blackened(0), vec![left, right]);
        assert_eq!(doc.commits(), 1);
    }

    #[test]
    fn test_oracle_failure_is_reported() {
        let mut doc = MemoryDocument::from_pages(&[&["x"]])
            .with_image(0, 2, Some(Rect::new(0.0, 0.0, 20.0, 20.0)));
        let vision = ScriptedVision::new(vec![Err(OracleError::Api {
            status: 500,
            message: "boom".into(),
        })]);

        let reports = ImageRegionRedactor::new(&vision, SPEC).run(&mut doc).unwrap();
        assert!(matches!(reports[0].outcome, ImageOutcome::Failed { .. }));
        assert!(doc.blackened(0).is_empty());
    }
}
