//! Redaction targets produced by the oracle.

use serde::{Deserialize, Serialize};

/// How a target is located on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// Substring match against individual words.
    Word,
    /// Multi-word search across span boundaries.
    Phrase,
}

impl Granularity {
    /// Whitespace inference: no internal whitespace means a single word.
    pub fn infer(text: &str) -> Self {
        if text.trim().contains(char::is_whitespace) {
            Granularity::Phrase
        } else {
            Granularity::Word
        }
    }

    /// Maps the oracle's tag vocabulary; both the explicit per-target values
    /// and the page-level `specific`/`general` tags are accepted.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "word" | "specific" => Some(Granularity::Word),
            "phrase" | "general" => Some(Granularity::Phrase),
            _ => None,
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Granularity::Word => write!(f, "word"),
            Granularity::Phrase => write!(f, "phrase"),
        }
    }
}

/// One unit the oracle wants removed from a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionTarget {
    pub text: String,
    pub granularity: Granularity,
}

impl RedactionTarget {
    /// Target with granularity inferred from whitespace.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let granularity = Granularity::infer(&text);
        Self { text, granularity }
    }

    /// Target with a requested granularity. A multi-word target is always a
    /// phrase: no single word can contain it.
    pub fn with_granularity(text: impl Into<String>, requested: Granularity) -> Self {
        let text = text.into();
        let granularity = match Granularity::infer(&text) {
            Granularity::Phrase => Granularity::Phrase,
            Granularity::Word => requested,
        };
        Self { text, granularity }
    }
}
