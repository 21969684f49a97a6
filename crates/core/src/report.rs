//! What happened to a document: per pass, per page, per target.

use serde::{Deserialize, Serialize};

use crate::document::{ImageResourceId, TextSource};
use crate::geometry::Rect;
use crate::resolver::Resolution;

/// Per-document reconciliation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    #[default]
    Pending,
    Pass1Complete,
    /// Final: no further passes are attempted.
    Pass2Complete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PageOutcome {
    /// Oracle consulted, targets resolved and committed.
    Processed,
    /// No extractable text; the oracle was not consulted.
    NoText,
    /// The oracle failed and the page was skipped.
    OracleFailed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageReport {
    pub page: usize,
    pub source: TextSource,
    pub outcome: PageOutcome,
    pub targets: Vec<Resolution>,
    /// Annotations applied by this page's commit.
    pub committed: usize,
}

impl PageReport {
    pub fn unresolved(&self) -> impl Iterator<Item = &Resolution> {
        self.targets.iter().filter(|r| !r.is_resolved())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassReport {
    pub pass: u8,
    pub pages: Vec<PageReport>,
}

impl PassReport {
    pub fn new(pass: u8) -> Self {
        Self {
            pass,
            pages: Vec::new(),
        }
    }

    pub fn committed(&self) -> usize {
        self.pages.iter().map(|p| p.committed).sum()
    }

    pub fn failed_pages(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| matches!(p.outcome, PageOutcome::OracleFailed { .. }))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImageOutcome {
    /// The vision oracle found nothing to redact.
    Clean,
    /// Flagged; the whole placement rectangle was redacted.
    Redacted { rect: Rect, findings: Vec<String> },
    /// The resource is never drawn on the page.
    Unplaced,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageReport {
    pub page: usize,
    pub resource: ImageResourceId,
    pub name: String,
    pub outcome: ImageOutcome,
}

/// Targeted text still extractable after the final pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leak {
    pub page: usize,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentReport {
    pub state: DocumentState,
    pub passes: Vec<PassReport>,
    pub images: Vec<ImageReport>,
    pub leaks: Vec<Leak>,
}

impl DocumentReport {
    /// Targets the final pass could not place, with their page.
    pub fn unresolved(&self) -> Vec<(usize, &Resolution)> {
        self.passes
            .last()
            .map(|pass| {
                pass.pages
                    .iter()
                    .flat_map(|p| p.unresolved().map(move |r| (p.page, r)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn committed(&self) -> usize {
        let images = self
            .images
            .iter()
            .filter(|i| matches!(i.outcome, ImageOutcome::Redacted { .. }))
            .count();
        self.passes.iter().map(PassReport::committed).sum::<usize>() + images
    }
}
