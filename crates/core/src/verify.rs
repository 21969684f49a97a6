//! Post-redaction leak sweep.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::document::RedactableDocument;
use crate::index::PageTextIndex;
use crate::report::Leak;
use crate::resolver::{collapse_whitespace, normalize_quotes};
use crate::target::RedactionTarget;
use crate::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyResult {
    pub ok: bool,
    pub leaks: Vec<Leak>,
}

/// Targets among `targets` whose text can still be found in `page_text`.
pub fn find_leaks<'t>(page_text: &str, targets: &'t [RedactionTarget]) -> Vec<&'t RedactionTarget> {
    let haystack = collapse_whitespace(&normalize_quotes(page_text));
    targets
        .iter()
        .filter(|t| {
            let needle = collapse_whitespace(&normalize_quotes(&t.text));
            !needle.is_empty() && haystack.contains(&needle)
        })
        .collect()
}

/// Re-reads every listed page and reports targets still present in its
/// extracted text.
pub fn verify_document<D>(
    doc: &mut D,
    targets: &BTreeMap<usize, Vec<RedactionTarget>>,
) -> Result<VerifyResult>
where
    D: RedactableDocument + ?Sized,
{
    let mut leaks = Vec::new();
    for (&page, page_targets) in targets {
        if page_targets.is_empty() {
            continue;
        }
        let content = doc.read_page(page)?;
        let index = PageTextIndex::build(&content.extraction);
        for target in find_leaks(&index.full_text, page_targets) {
            log::warn!("[Verify] page {}: '{}' is still extractable", page, target.text);
            leaks.push(Leak {
                page,
                text: target.text.clone(),
            });
        }
    }

    Ok(VerifyResult {
        ok: leaks.is_empty(),
        leaks,
    })
}
