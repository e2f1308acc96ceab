//! Answer generation for transcribed interview prompts.
//!
//! Each provider wraps one hosted chat API behind a small trait so the
//! session loop can hand over a prompt plus conversation context without
//! caring which HTTP shape sits behind it. Request bodies and response
//! parsing live with the providers; this module owns what they share:
//! response sizing, history windowing, and provider selection.

mod gemini;
mod openai;

pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

use anyhow::Result;
use clap::ValueEnum;

use crate::history::Turn;

/// Prior turns forwarded with each request (five question/answer exchanges).
pub const HISTORY_WINDOW: usize = 10;

/// How long a generated answer should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResponseSize {
    Small,
    Medium,
    Large,
}

impl ResponseSize {
    /// Completion-token budget passed to the provider API.
    pub fn max_tokens(self) -> u32 {
        match self {
            ResponseSize::Small => 512,
            ResponseSize::Medium => 1536,
            ResponseSize::Large => 4096,
        }
    }

    /// Length guidance appended to the system prompt.
    pub fn length_instruction(self) -> &'static str {
        match self {
            ResponseSize::Small => {
                "Keep your response very brief and concise - around 2-3 sentences maximum. Get straight to the point."
            }
            ResponseSize::Medium => {
                "Provide a moderate-length response with key details. Use bullet points if helpful. Keep it focused."
            }
            ResponseSize::Large => {
                "You can provide a detailed, comprehensive response with examples and explanations."
            }
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ResponseSize::Small => "small",
            ResponseSize::Medium => "medium",
            ResponseSize::Large => "large",
        }
    }
}

/// Hosted APIs that can back answer generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    #[value(name = "openai")]
    OpenAi,
    Gemini,
}

impl ProviderKind {
    /// Model used when the CLI does not override one.
    pub fn default_model(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4.1-mini",
            ProviderKind::Gemini => "gemini-2.5-flash",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
        }
    }
}

/// One prompt plus the context a provider needs to answer it.
pub struct AnswerRequest<'a> {
    pub prompt: &'a str,
    pub size: ResponseSize,
    pub history: &'a [Turn],
    pub model: Option<&'a str>,
    pub temperature: Option<f64>,
}

/// Interface the session loop uses to turn a transcript into an answer.
pub trait AnswerProvider: Send {
    /// Internal identifier for this provider (e.g. "openai").
    fn name(&self) -> &'static str;

    /// Generate an answer for `request`, blocking until the API responds.
    fn generate(&self, request: &AnswerRequest<'_>) -> Result<String>;
}

/// Build the provider selected at startup.
pub fn create_provider(kind: ProviderKind, api_key: String) -> Box<dyn AnswerProvider> {
    match kind {
        ProviderKind::OpenAi => Box::new(OpenAiProvider::new(api_key)),
        ProviderKind::Gemini => Box::new(GeminiProvider::new(api_key)),
    }
}

/// Trim history to the most recent [`HISTORY_WINDOW`] turns, oldest first.
pub(crate) fn recent_window(history: &[Turn]) -> &[Turn] {
    let skip = history.len().saturating_sub(HISTORY_WINDOW);
    &history[skip..]
}
