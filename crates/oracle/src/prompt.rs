//! Prompt templates and the redaction specification.
//!
//! Templates use `{name}` placeholders; `{{` and `}}` stand for literal
//! braces so JSON examples can be embedded in a prompt.

use std::path::Path;

use thiserror::Error;

/// Placeholder replaced with the page text.
pub const PAGE_TEXT: &str = "page_text";
/// Placeholder replaced with the redaction specification.
pub const SPECIFICATION: &str = "redaction_specs";

#[derive(Error, Debug)]
pub enum PromptError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} is empty")]
    Empty(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    source: String,
}

impl PromptTemplate {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, PromptError> {
        Ok(Self::new(read_non_empty(path)?))
    }

    pub fn has_placeholder(&self, name: &str) -> bool {
        self.source.contains(&format!("{{{}}}", name))
    }

    /// Substitutes known placeholders. Unknown `{name}` sequences are kept
    /// verbatim.
    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        let mut out = String::with_capacity(self.source.len());
        let mut rest = self.source.as_str();

        while let Some(pos) = rest.find(|c: char| c == '{' || c == '}') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];

            if tail.starts_with("{{") || tail.starts_with("}}") {
                out.push_str(&tail[..1]);
                rest = &tail[2..];
                continue;
            }
            if tail.starts_with('{') {
                if let Some(close) = tail.find('}') {
                    let name = &tail[1..close];
                    if let Some((_, value)) = vars.iter().find(|(k, _)| *k == name) {
                        out.push_str(value);
                        rest = &tail[close + 1..];
                        continue;
                    }
                }
            }
            out.push_str(&tail[..1]);
            rest = &tail[1..];
        }

        out.push_str(rest);
        out
    }
}

/// Loads the redaction specification, trimmed.
pub fn load_specification(path: &Path) -> Result<String, PromptError> {
    read_non_empty(path)
}

fn read_non_empty(path: &Path) -> Result<String, PromptError> {
    let text = std::fs::read_to_string(path).map_err(|source| PromptError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let text = text.trim();
    if text.is_empty() {
        return Err(PromptError::Empty(path.display().to_string()));
    }
    Ok(text.to_string())
}
