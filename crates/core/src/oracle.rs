//! Oracle boundary: the traits the controller calls and the reply contract
//! both oracle flavours share.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::target::{Granularity, RedactionTarget};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    #[error("API returned status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("malformed reply: {0}")]
    Malformed(String),
    #[error("model refused: {0}")]
    Refused(String),
}

impl OracleError {
    /// Worth another attempt: timeouts, transport failures, rate limiting
    /// and server errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            OracleError::Timeout | OracleError::Transport(_) => true,
            OracleError::Api { status, .. } => *status == 429 || *status >= 500,
            OracleError::Malformed(_) | OracleError::Refused(_) => false,
        }
    }
}

/// Decides what to redact from a page's text.
pub trait TextOracle {
    fn identify(&self, page_text: &str, specification: &str) -> Result<OracleReply, OracleError>;
}

/// Decides whether a PNG image holds sensitive content.
pub trait VisionOracle {
    fn inspect_image(&self, png: &[u8], specification: &str) -> Result<OracleReply, OracleError>;
}

/// Parsed oracle reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleReply {
    pub targets: Vec<RedactionTarget>,
    /// Page-level tag, when the reply carried one.
    pub page_granularity: Option<Granularity>,
}

impl OracleReply {
    pub fn new(targets: Vec<RedactionTarget>) -> Self {
        Self {
            targets,
            page_granularity: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Parses a text-oracle reply. The `redactions` key is required.
    pub fn parse(content: &str) -> Result<Self, OracleError> {
        Self::parse_inner(content, true)
    }

    /// Parses a vision-oracle reply, where a missing `redactions` key means
    /// nothing needs redacting.
    pub fn parse_vision(content: &str) -> Result<Self, OracleError> {
        Self::parse_inner(content, false)
    }

    fn parse_inner(content: &str, require_key: bool) -> Result<Self, OracleError> {
        let body = strip_code_fences(content);
        let value: Value = serde_json::from_str(body)
            .map_err(|e| OracleError::Malformed(format!("not JSON: {}", e)))?;
        let object = value
            .as_object()
            .ok_or_else(|| OracleError::Malformed("reply is not a JSON object".into()))?;

        let page_granularity = object
            .get("granularity")
            .and_then(Value::as_str)
            .and_then(Granularity::from_tag);

        let entries: &[Value] = match object.get("redactions") {
            Some(Value::Array(entries)) => entries.as_slice(),
            Some(Value::Null) | None if !require_key => &[],
            Some(other) => {
                return Err(OracleError::Malformed(format!(
                    "`redactions` must be an array, got {}",
                    type_name(other)
                )))
            }
            None => return Err(OracleError::Malformed("missing `redactions` key".into())),
        };

        let mut seen = HashSet::new();
        let mut targets = Vec::with_capacity(entries.len());
        for entry in entries {
            let (text, explicit) = match entry {
                Value::String(text) => (text.as_str(), None),
                Value::Object(fields) => match fields.get("text").and_then(Value::as_str) {
                    Some(text) => (
                        text,
                        fields
                            .get("granularity")
                            .and_then(Value::as_str)
                            .and_then(Granularity::from_tag),
                    ),
                    None => {
                        log::debug!("[Oracle] skipping entry without text: {}", entry);
                        continue;
                    }
                },
                other => {
                    log::debug!("[Oracle] skipping {} entry", type_name(other));
                    continue;
                }
            };

            let text = text.trim();
            if text.is_empty() || !seen.insert(text.to_string()) {
                continue;
            }
            let target = match explicit.or(page_granularity) {
                Some(requested) => RedactionTarget::with_granularity(text, requested),
                None => RedactionTarget::new(text),
            };
            targets.push(target);
        }

        Ok(Self {
            targets,
            page_granularity,
        })
    }
}

/// Removes a surrounding Markdown code fence (with or without a language
/// tag), which chat models like to add even in JSON mode.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
