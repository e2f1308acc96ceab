//! Gemini generateContent provider.
//!
//! Gemini gets the coaching prompt via `systemInstruction` and does not see
//! the history as separate turns: recent exchanges are folded into a single
//! "Previous conversation:" preamble ahead of the current question.

use anyhow::{Context, Result};
use serde_json::{json, Value};

use super::{recent_window, AnswerProvider, AnswerRequest, ProviderKind};
use crate::history::Role;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

const SYSTEM_PROMPT: &str = r"You are a professional interview coach and expert assistant. You are helping a candidate during a live interview by providing accurate, confident, and well-structured answers to interview questions.

Your role:
- Provide clear, professional answers as if you were the ideal candidate
- Be concise yet comprehensive - cover key points without rambling
- Use industry-standard terminology and best practices
- Structure answers logically (use frameworks like STAR for behavioral questions)
- For technical questions, provide accurate code examples or explanations
- Be confident and articulate in your responses";

/// Answer generator backed by the Gemini generateContent API.
pub struct GeminiProvider {
    api_key: String,
}

impl GeminiProvider {
    pub fn new(api_key: String) -> Self {
        Self { api_key }
    }

    fn system_prompt(request: &AnswerRequest<'_>) -> String {
        format!("{SYSTEM_PROMPT}\n\n{}", request.size.length_instruction())
    }

    /// Collapse recent history plus the current prompt into one user message.
    fn full_prompt(request: &AnswerRequest<'_>) -> String {
        let recent = recent_window(request.history);
        if recent.is_empty() {
            return request.prompt.to_string();
        }
        let context = recent
            .iter()
            .map(|turn| {
                let speaker = match turn.role {
                    Role::User => "User",
                    Role::Assistant => "Assistant",
                };
                format!("{speaker}: {}", turn.text)
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        format!(
            "Previous conversation:\n{context}\n\nCurrent question: {}",
            request.prompt
        )
    }

    fn build_body(request: &AnswerRequest<'_>) -> Value {
        let mut generation_config = json!({ "maxOutputTokens": request.size.max_tokens() });
        if let Some(temperature) = request.temperature {
            generation_config["temperature"] = json!(temperature);
        }
        json!({
            "systemInstruction": { "parts": [{ "text": Self::system_prompt(request) }] },
            "contents": [{ "role": "user", "parts": [{ "text": Self::full_prompt(request) }] }],
            "generationConfig": generation_config,
        })
    }

    fn request_url(request: &AnswerRequest<'_>) -> String {
        let model = request.model.unwrap_or(ProviderKind::Gemini.default_model());
        format!("{API_BASE}/models/{model}:generateContent")
    }

    fn extract_answer(response: &Value) -> Result<String> {
        response["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(str::to_owned)
            .with_context(|| format!("unexpected Gemini response shape: {response}"))
    }
}

impl AnswerProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn generate(&self, request: &AnswerRequest<'_>) -> Result<String> {
        let body = Self::build_body(request);
        let mut response = ureq::post(Self::request_url(request))
            .header("x-goog-api-key", self.api_key.as_str())
            .send_json(body)
            .context("Gemini request failed")?;
        let parsed: Value = response
            .body_mut()
            .read_json()
            .context("Gemini response was not valid JSON")?;
        Self::extract_answer(&parsed)
    }
}
