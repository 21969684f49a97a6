//! Chat-completions client for the text and vision oracles.

use std::time::{Duration, Instant};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use blackline_core::{OracleError, OracleReply, TextOracle, VisionOracle};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::prompt::{PromptTemplate, PAGE_TEXT, SPECIFICATION};

pub const SYSTEM_MESSAGE: &str = "You are a PDF redaction assistant. \
    Your task is to adaptively redact text based on the Redaction Specifications. \
    You must follow the instructions strictly and return results only in the required JSON format.";

/// Used when no image prompt file is configured.
pub const DEFAULT_IMAGE_PROMPT: &str = "Inspect this image against the redaction specifications \
    below. Reply with a JSON object {{\"redactions\": [...]}} listing every sensitive item you \
    can see, or an empty list if there is nothing to redact.\n\n{redaction_specs}";

/// Oracle endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OracleConfig {
    #[serde(alias = "api_key")]
    pub api_key: Option<String>,
    #[serde(alias = "base_url")]
    pub base_url: String,
    pub model: String,
    #[serde(alias = "vision_model")]
    pub vision_model: String,
    pub temperature: f32,
    #[serde(alias = "timeout_secs")]
    pub timeout_secs: u64,
    #[serde(alias = "max_retries")]
    pub max_retries: u32,
    /// Completion cap for vision requests.
    #[serde(alias = "max_tokens")]
    pub max_tokens: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            vision_model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            timeout_secs: 120,
            max_retries: 2,
            max_tokens: 300,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    response_format: ResponseFormat,
}

#[derive(Serialize, Debug)]
struct Message {
    role: &'static str,
    content: Value,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    type_: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    refusal: Option<String>,
}

pub struct OpenAiOracle {
    client: Client,
    config: OracleConfig,
    api_key: String,
    text_prompt: PromptTemplate,
    image_prompt: PromptTemplate,
    retry_delay: Duration,
}

impl OpenAiOracle {
    pub fn new(
        config: OracleConfig,
        api_key: impl Into<String>,
        text_prompt: PromptTemplate,
    ) -> Result<Self, OracleError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        if !text_prompt.has_placeholder(PAGE_TEXT) {
            log::warn!("[Oracle] text prompt has no {{{}}} placeholder", PAGE_TEXT);
        }

        Ok(Self {
            client,
            config,
            api_key: api_key.into(),
            text_prompt,
            image_prompt: PromptTemplate::new(DEFAULT_IMAGE_PROMPT),
            retry_delay: Duration::from_secs(2),
        })
    }

    pub fn with_image_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.image_prompt = prompt;
        self
    }

    /// Base delay between retries; attempt `n` waits `n` times this.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn complete(&self, request: &ChatRequest<'_>) -> Result<String, OracleError> {
        let mut attempt = 0;
        loop {
            let start = Instant::now();
            match self.send(request) {
                Ok(content) => {
                    log::debug!(
                        "[Oracle] {} answered in {} ms",
                        request.model,
                        start.elapsed().as_millis()
                    );
                    return Ok(content);
                }
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    log::warn!(
                        "[Oracle] {} (attempt {}/{}), retrying",
                        e,
                        attempt,
                        self.config.max_retries + 1
                    );
                    std::thread::sleep(self.retry_delay * attempt);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn send(&self, request: &ChatRequest<'_>) -> Result<String, OracleError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .map_err(transport_error)?;

        let status = response.status();
        let text = response.text().map_err(transport_error)?;
        if !status.is_success() {
            return Err(OracleError::Api {
                status: status.as_u16(),
                message: api_error_message(&text),
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| OracleError::Malformed(format!("unexpected response body: {}", e)))?;
        let message = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| OracleError::Malformed("no choices in response".into()))?
            .message;

        if let Some(refusal) = message.refusal {
            return Err(OracleError::Refused(refusal));
        }
        message
            .content
            .ok_or_else(|| OracleError::Malformed("response has no content".into()))
    }
}

impl TextOracle for OpenAiOracle {
    fn identify(&self, page_text: &str, specification: &str) -> Result<OracleReply, OracleError> {
        let prompt = self
            .text_prompt
            .render(&[(PAGE_TEXT, page_text), (SPECIFICATION, specification)]);
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                Message {
                    role: "system",
                    content: Value::String(SYSTEM_MESSAGE.to_string()),
                },
                Message {
                    role: "user",
                    content: Value::String(prompt),
                },
            ],
            temperature: self.config.temperature,
            max_tokens: None,
            response_format: ResponseFormat {
                type_: "json_object",
            },
        };

        let content = self.complete(&request)?;
        log::debug!("[Oracle] reply: {}", content);
        OracleReply::parse(&content)
    }
}

impl VisionOracle for OpenAiOracle {
    fn inspect_image(&self, png: &[u8], specification: &str) -> Result<OracleReply, OracleError> {
        let prompt = self.image_prompt.render(&[(SPECIFICATION, specification)]);
        let data_url = format!("data:image/png;base64,{}", BASE64.encode(png));
        let request = ChatRequest {
            model: &self.config.vision_model,
            messages: vec![Message {
                role: "user",
                content: json!([
                    {"type": "text", "text": prompt},
                    {"type": "image_url", "image_url": {"url": data_url}}
                ]),
            }],
            temperature: self.config.temperature,
            max_tokens: Some(self.config.max_tokens),
            response_format: ResponseFormat {
                type_: "json_object",
            },
        };

        let content = self.complete(&request)?;
        log::debug!("[Oracle] vision reply: {}", content);
        OracleReply::parse_vision(&content)
    }
}

fn transport_error(e: reqwest::Error) -> OracleError {
    if e.is_timeout() {
        OracleError::Timeout
    } else {
        OracleError::Transport(e.to_string())
    }
}

/// Pulls `error.message` out of an API error body, falling back to the raw
/// body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}
