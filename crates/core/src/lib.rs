//! Redaction-targeting engine.
//!
//! Turns oracle-chosen words and phrases into page rectangles, applies them
//! and reconciles the result over two passes. Backends plug in through
//! [`RedactableDocument`]; oracles through [`TextOracle`] and [`VisionOracle`].

pub mod applier;
pub mod controller;
pub mod document;
pub mod geometry;
pub mod images;
pub mod index;
pub mod oracle;
pub mod report;
pub mod resolver;
pub mod target;
pub mod verify;

#[cfg(test)]
pub(crate) mod testing;

pub use applier::RedactionApplier;
pub use controller::{CancelToken, OracleFailurePolicy, TwoPassController};
pub use document::{
    ImageResourceId, PageContent, PageImage, PageSearch, RedactableDocument, RedactionAnnotation,
    TextSource,
};
pub use geometry::{Fill, Rect};
pub use images::ImageRegionRedactor;
pub use index::{PageExtraction, PageTextIndex, RawSpan, TextSpan, Word};
pub use oracle::{OracleError, OracleReply, TextOracle, VisionOracle};
pub use report::{DocumentReport, DocumentState, ImageOutcome, ImageReport, Leak, PageOutcome};
pub use resolver::{PageQuery, PhraseResolver, Resolution, SlidingWindowResolver, TextSearch};
pub use target::{Granularity, RedactionTarget};

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("document error: {0}")]
    Document(String),
    #[error("page {0} is out of range")]
    PageOutOfRange(usize),
    #[error("oracle failed on page {page}: {source}")]
    Oracle {
        page: usize,
        #[source]
        source: OracleError,
    },
    #[error("cancelled")]
    Cancelled,
}
