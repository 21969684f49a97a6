//! Language-model oracles over an OpenAI-compatible chat-completions API.

pub mod client;
pub mod prompt;

pub use client::{OpenAiOracle, OracleConfig, DEFAULT_IMAGE_PROMPT, SYSTEM_MESSAGE};
pub use prompt::{load_specification, PromptError, PromptTemplate};
