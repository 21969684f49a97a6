//! Two-Pass Reconciliation Controller
//!
//! Runs the per-page pipeline (oracle, resolve, apply, commit) over the
//! whole document twice. Pass 2 re-reads every page after pass 1's commits,
//! which is what lets targets masked by noisy extraction resolve. Exactly
//! two passes; leftovers are reported, not retried.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::applier::RedactionApplier;
use crate::document::{PageSearch, RedactableDocument, TextSource};
use crate::index::PageTextIndex;
use crate::oracle::TextOracle;
use crate::report::{DocumentReport, DocumentState, PageOutcome, PageReport, PassReport};
use crate::resolver::{PageQuery, PhraseResolver, Resolution, SlidingWindowResolver, TextSearch};
use crate::target::RedactionTarget;
use crate::verify::verify_document;
use crate::{CoreError, Result};

/// What to do with a page whose oracle call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OracleFailurePolicy {
    /// Log, record the failure and continue with the next page.
    #[default]
    SkipPage,
    /// Stop processing the document.
    AbortDocument,
}

/// Cooperative cancellation, checked between pages.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct TwoPassController<'a, R = SlidingWindowResolver> {
    oracle: &'a dyn TextOracle,
    specification: &'a str,
    resolver: R,
    applier: RedactionApplier,
    policy: OracleFailurePolicy,
    cancel: CancelToken,
}

impl<'a> TwoPassController<'a, SlidingWindowResolver> {
    pub fn new(oracle: &'a dyn TextOracle, specification: &'a str) -> Self {
        Self::with_resolver(oracle, specification, SlidingWindowResolver::default())
    }
}

impl<'a, R: PhraseResolver> TwoPassController<'a, R> {
    pub fn with_resolver(oracle: &'a dyn TextOracle, specification: &'a str, resolver: R) -> Self {
        Self {
            oracle,
            specification,
            resolver,
            applier: RedactionApplier::default(),
            policy: OracleFailurePolicy::default(),
            cancel: CancelToken::default(),
        }
    }

    pub fn with_policy(mut self, policy: OracleFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_applier(mut self, applier: RedactionApplier) -> Self {
        self.applier = applier;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn run<D>(&self, doc: &mut D) -> Result<DocumentReport>
    where
        D: RedactableDocument + ?Sized,
    {
        self.run_with_checkpoint(doc, |_| Ok(()))
    }

    /// Runs both passes. `checkpoint` sees the intermediate document right
    /// after pass 1.
    pub fn run_with_checkpoint<D, F>(
        &self,
        doc: &mut D,
        mut checkpoint: F,
    ) -> Result<DocumentReport>
    where
        D: RedactableDocument + ?Sized,
        F: FnMut(&D) -> Result<()>,
    {
        let mut report = DocumentReport::default();
        let mut targeted: BTreeMap<usize, Vec<RedactionTarget>> = BTreeMap::new();

        for pass in 1..=2u8 {
            let pass_report = self.run_pass(doc, pass, &mut targeted)?;
            log::info!(
                "[Controller] pass {} done: {} page(s), {} redaction(s), {} oracle failure(s)",
                pass,
                pass_report.pages.len(),
                pass_report.committed(),
                pass_report.failed_pages()
            );
            report.passes.push(pass_report);

            if pass == 1 {
                report.state = DocumentState::Pass1Complete;
                checkpoint(&*doc)?;
            }
        }
        report.state = DocumentState::Pass2Complete;

        let verified = verify_document(doc, &targeted)?;
        report.leaks = verified.leaks;

        for (page, resolution) in report.unresolved() {
            log::warn!(
                "[Controller] unresolved after final pass: page {} '{}'",
                page,
                resolution.target.text
            );
        }
        Ok(report)
    }

    fn run_pass<D>(
        &self,
        doc: &mut D,
        pass: u8,
        targeted: &mut BTreeMap<usize, Vec<RedactionTarget>>,
    ) -> Result<PassReport>
    where
        D: RedactableDocument + ?Sized,
    {
        let mut report = PassReport::new(pass);

        for page in 0..doc.page_count() {
            if self.cancel.is_cancelled() {
                log::warn!("[Controller] cancelled before page {} of pass {}", page, pass);
                return Err(CoreError::Cancelled);
            }

            let content = doc.read_page(page)?;
            let index = PageTextIndex::build(&content.extraction);
            if content.text.trim().is_empty() && index.is_empty() {
                log::debug!("[Controller] pass {} page {}: no text", pass, page);
                report.pages.push(PageReport {
                    page,
                    source: content.source,
                    outcome: PageOutcome::NoText,
                    targets: Vec::new(),
                    committed: 0,
                });
                continue;
            }

            let reply = match self.oracle.identify(&content.text, self.specification) {
                Ok(reply) => reply,
                Err(e) => match self.policy {
                    OracleFailurePolicy::SkipPage => {
                        log::error!(
                            "[Controller] pass {} page {}: oracle failed, skipping: {}",
                            pass,
                            page,
                            e
                        );
                        report.pages.push(PageReport {
                            page,
                            source: content.source,
                            outcome: PageOutcome::OracleFailed {
                                error: e.to_string(),
                            },
                            targets: Vec::new(),
                            committed: 0,
                        });
                        continue;
                    }
                    OracleFailurePolicy::AbortDocument => {
                        return Err(CoreError::Oracle { page, source: e });
                    }
                },
            };
            log::info!(
                "[Controller] pass {} page {}: oracle returned {} target(s)",
                pass,
                page,
                reply.targets.len()
            );

            let native = content.source == TextSource::TextLayer && doc.supports_native_search();
            let resolutions: Vec<Resolution> = {
                let search = PageSearch::new(&*doc, page);
                let query = PageQuery {
                    index: &index,
                    bounds: content.bounds,
                    search: if native { Some(&search as &dyn TextSearch) } else { None },
                };
                reply
                    .targets
                    .iter()
                    .map(|target| self.resolver.resolve(&query, target))
                    .collect()
            };

            let committed = self.applier.apply(doc, page, &resolutions, &content.bounds)?;

            let seen = targeted.entry(page).or_default();
            for target in reply.targets {
                if !seen.contains(&target) {
                    seen.push(target);
                }
            }

            report.pages.push(PageReport {
                page,
                source: content.source,
                outcome: PageOutcome::Processed,
                targets: resolutions,
                committed,
            });
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::OracleError;
    use crate::resolver::Strategy;
    use crate::testing::{KeywordOracle, MemoryDocument, ScriptedOracle};

    const SPEC: &str = "Redact person names and phone numbers.";

    #[test]
    fn test_contact_card_end_to_end() {
        let mut doc = MemoryDocument::from_pages(&[&["Contact John Doe at 555-1234"]]);
        let oracle = ScriptedOracle::new(vec![Ok(r#"{"redactions": ["John Doe", "555-1234"]}"#)]);

        let report = TwoPassController::new(&oracle, SPEC).run(&mut doc).unwrap();

        let pass1 = &report.passes[0].pages[0];
        assert_eq!(pass1.committed, 2);
        assert!(pass1.targets.iter().all(Resolution::is_resolved));
        let text = doc.page_text(0);
        assert!(!text.contains("John Doe"));
        assert!(!text.contains("555-1234"));
        assert_eq!(text, "Contact at");
        assert_eq!(report.state, DocumentState::Pass2Complete);
        assert!(report.leaks.is_empty());
        assert!(report.unresolved().is_empty());
        assert_eq!(oracle.calls()[0], "Contact John Doe at 555-1234");
    }

    #[test]
    fn test_second_pass_reads_redacted_text() {
        let mut doc = MemoryDocument::from_pages(&[&["Contact John Doe at 555-1234"]]);
        let oracle = ScriptedOracle::new(vec![
            Ok(r#"{"redactions": ["John Doe"]}"#),
            Ok(r#"{"redactions": ["555-1234"]}"#),
        ]);

        let mut after_pass1 = String::new();
        let report = TwoPassController::new(&oracle, SPEC)
            .run_with_checkpoint(&mut doc, |d| {
                after_pass1 = d.page_text(0);
                Ok(())
            })
            .unwrap();

        assert!(after_pass1.contains("555-1234"), "pass 1 alone leaves the number");
        assert!(!after_pass1.contains("John"));
        assert_eq!(oracle.calls()[1], "Contact at 555-1234");
        assert!(!doc.page_text(0).contains("555-1234"));
        assert_eq!(report.passes.len(), 2);
        assert_eq!(report.passes[1].pages[0].committed, 1);
    }

    #[test]
    fn test_exactly_two_passes() {
        let mut doc = MemoryDocument::from_pages(&[&["alpha"], &["beta"]]);
        let oracle = ScriptedOracle::new(Vec::new());
        let report = TwoPassController::new(&oracle, SPEC).run(&mut doc).unwrap();
        assert_eq!(report.passes.len(), 2);
        assert_eq!(oracle.calls().len(), 4);
    }

    #[test]
    fn test_unresolved_target_is_reported_not_fatal() {
        let mut doc = MemoryDocument::from_pages(&[&["Contact John Doe"], &["Second page Doe"]]);
        let oracle = KeywordOracle::new(&["Doe"]).always_claim("Jane Roe");

        let report = TwoPassController::new(&oracle, SPEC).run(&mut doc).unwrap();

        let unresolved = report.unresolved();
        assert_eq!(unresolved.len(), 2);
        assert!(unresolved.iter().all(|(_, r)| r.target.text == "Jane Roe"));
        assert!(!doc.page_text(0).contains("Doe"));
        assert!(!doc.page_text(1).contains("Doe"));
    }

    #[test]
    fn test_oracle_failure_skips_page() {
        let mut doc = MemoryDocument::from_pages(&[&["Call John"], &["Call Mary"]]);
        let oracle = ScriptedOracle::new(vec![
            Err(OracleError::Malformed("not JSON".into())),
            Ok(r#"{"redactions": ["Mary"]}"#),
        ]);

        let report = TwoPassController::new(&oracle, SPEC).run(&mut doc).unwrap();
        let pass1 = &report.passes[0];
        assert!(matches!(pass1.pages[0].outcome, PageOutcome::OracleFailed { .. }));
        assert_eq!(pass1.pages[1].outcome, PageOutcome::Processed);
        assert_eq!(doc.page_text(0), "Call John");
        assert_eq!(doc.page_text(1), "Call");
    }

    #[test]
    fn test_oracle_failure_can_abort_document() {
        let mut doc = MemoryDocument::from_pages(&[&["Call John"], &["Call Mary"]]);
        let oracle = ScriptedOracle::new(vec![Err(OracleError::Timeout)]);

        let err = TwoPassController::new(&oracle, SPEC)
            .with_policy(OracleFailurePolicy::AbortDocument)
            .run(&mut doc)
            .unwrap_err();
        assert!(matches!(err, CoreError::Oracle { page: 0, source: OracleError::Timeout }));
        assert_eq!(oracle.calls().len(), 1);
    }

    #[test]
    fn test_cancel_between_pages_keeps_commits() {
        let mut doc = MemoryDocument::from_pages(&[&["Call John"], &["Call Mary"]]);
        let cancel = CancelToken::new();
        let oracle = KeywordOracle::new(&["John", "Mary"]).cancel_after(1, cancel.clone());

        let err = TwoPassController::new(&oracle, SPEC)
            .with_cancel_token(cancel)
            .run(&mut doc)
            .unwrap_err();
        assert!(matches!(err, CoreError::Cancelled));
        assert_eq!(doc.page_text(0), "Call");
        assert_eq!(doc.page_text(1), "Call Mary");
    }

    #[test]
    fn test_blank_pages_skip_the_oracle() {
        let mut doc = MemoryDocument::from_pages(&[&[], &["Call John"]]);
        let oracle = ScriptedOracle::new(Vec::new());
        let report = TwoPassController::new(&oracle, SPEC).run(&mut doc).unwrap();
        assert_eq!(report.passes[0].pages[0].outcome, PageOutcome::NoText);
        assert_eq!(oracle.calls().len(), 2);
    }

    #[test]
    fn test_ocr_pages_use_offset_reconstruction() {
        let mut doc =
            MemoryDocument::from_pages(&[&["Contact John Doe at 555-1234"]]).with_ocr_page(0);
        let oracle = ScriptedOracle::new(vec![Ok(r#"{"redactions": ["John Doe"]}"#)]);

        let report = TwoPassController::new(&oracle, SPEC).run(&mut doc).unwrap();
        let resolution = &report.passes[0].pages[0].targets[0];
        assert_eq!(resolution.strategy, Some(Strategy::SingleSpan));
        assert_eq!(doc.searches(), 0);
        assert_eq!(doc.page_text(0), "Contact at 555-1234");
    }

    #[test]
    fn test_phrase_split_across_lines_is_a_leak() {
        // native search does not match across the line break, the leak sweep does
        let mut doc = MemoryDocument::from_pages(&[&["Account holder John", "Doe since 2019"]]);
        let oracle = KeywordOracle::new(&[]).always_claim("John Doe");

        let report = TwoPassController::new(&oracle, SPEC).run(&mut doc).unwrap();
        assert_eq!(report.unresolved().len(), 1);
        assert_eq!(
            report.leaks,
            vec![crate::report::Leak {
                page: 0,
                text: "John Doe".into()
            }]
        );
    }

    #[test]
    fn test_report_serializes() {
        let mut doc = MemoryDocument::from_pages(&[&["Contact John Doe"]]);
        let oracle = ScriptedOracle::new(vec![Ok(r#"{"redactions": ["John Doe"]}"#)]);
        let report = TwoPassController::new(&oracle, SPEC).run(&mut doc).unwrap();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["state"], "pass2_complete");
        assert_eq!(json["passes"][0]["pages"][0]["outcome"]["status"], "processed");
        assert_eq!(json["passes"][0]["pages"][0]["targets"][0]["strategy"], "native_search");
    }
}
