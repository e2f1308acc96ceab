//! OpenAI chat-completions provider.
//!
//! The request is the standard `messages` array: one system message carrying
//! the coaching prompt plus length guidance, the recent history as alternating
//! user/assistant turns, then the current prompt as the final user message.

use anyhow::{Context, Result};
use serde_json::{json, Value};

use super::{recent_window, AnswerProvider, AnswerRequest, ProviderKind};
use crate::history::Role;

const ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

const SYSTEM_PROMPT: &str = r"You are a professional interview coach and expert assistant. You are helping a candidate during a live interview by providing accurate, confident, and well-structured answers to interview questions.

Your role:
- Provide clear, professional answers as if you were the ideal candidate
- Be concise yet comprehensive - cover key points without rambling
- Use industry-standard terminology and best practices
- Structure answers logically
- For technical questions, provide accurate code examples or explanations
- Be confident and articulate in your responses";

/// Answer generator backed by the OpenAI chat-completions API.
pub struct OpenAiProvider {
    api_key: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String) -> Self {
        Self { api_key }
    }

    fn system_prompt(request: &AnswerRequest<'_>) -> String {
        format!("{SYSTEM_PROMPT}\n\n{}", request.size.length_instruction())
    }

    fn build_body(request: &AnswerRequest<'_>) -> Value {
        let mut messages = vec![json!({
            "role": "system",
            "content": Self::system_prompt(request),
        })];
        for turn in recent_window(request.history) {
            let role = match turn.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            messages.push(json!({ "role": role, "content": turn.text }));
        }
        messages.push(json!({ "role": "user", "content": request.prompt }));

        let mut body = json!({
            "model": request.model.unwrap_or(ProviderKind::OpenAi.default_model()),
            "messages": messages,
            "max_tokens": request.size.max_tokens(),
        });
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }

    fn extract_answer(response: &Value) -> Result<String> {
        response["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_owned)
            .with_context(|| format!("unexpected OpenAI response shape: {response}"))
    }
}

impl AnswerProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn generate(&self, request: &AnswerRequest<'_>) -> Result<String> {
        let body = Self::build_body(request);
        let mut response = ureq::post(ENDPOINT)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send_json(body)
            .context("OpenAI request failed")?;
        let parsed: Value = response
            .body_mut()
            .read_json()
            .context("OpenAI response was not valid JSON")?;
        Self::extract_answer(&parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::ResponseSize;
    use crate::history::Turn;

    fn request<'a>(prompt: &'a str, history: &'a [Turn]) -> AnswerRequest<'a> {
        AnswerRequest {
            prompt,
            size: ResponseSize::Medium,
            history,
            model: None,
            temperature: None,
        }
    }

    fn turn(role: Role, text: &str) -> Turn {
        Turn {
            role,
            text: text.to_string(),
        }
    }

    #[test]
    fn body_without_history_is_system_plus_prompt() {
        let req = request("Tell me about yourself", &[]);
        let body = OpenAiProvider::build_body(&req);

        assert_eq!(body["model"], "gpt-4.1-mini");
        assert_eq!(body["max_tokens"], 1536);
        assert!(body.get("temperature").is_none());

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1], json!({ "role": "user", "content": "Tell me about yourself" }));
    }

    #[test]
    fn system_message_carries_prompt_and_length_guidance() {
        let req = request("q", &[]);
        let body = OpenAiProvider::build_body(&req);
        let content = body["messages"][0]["content"].as_str().unwrap();

        assert!(content.starts_with("You are a professional interview coach"));
        assert!(content.contains("- Structure answers logically\n"));
        assert!(!content.contains("STAR"));
        assert!(content.ends_with(ResponseSize::Medium.length_instruction()));
    }

    #[test]
    fn history_turns_become_alternating_messages() {
        let history = vec![
            turn(Role::User, "What is Rust?"),
            turn(Role::Assistant, "A systems language."),
        ];
        let req = request("Why use it?", &history);
        let body = OpenAiProvider::build_body(&req);

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1], json!({ "role": "user", "content": "What is Rust?" }));
        assert_eq!(
            messages[2],
            json!({ "role": "assistant", "content": "A systems language." })
        );
        assert_eq!(messages[3], json!({ "role": "user", "content": "Why use it?" }));
    }

    #[test]
    fn long_history_is_windowed_to_ten_turns() {
        let mut history = Vec::new();
        for i in 0..8 {
            history.push(turn(Role::User, &format!("q{i}")));
            history.push(turn(Role::Assistant, &format!("a{i}")));
        }
        let req = request("latest", &history);
        let body = OpenAiProvider::build_body(&req);

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 12); // system + 10 turns + prompt
        assert_eq!(messages[1]["content"], "q3");
        assert_eq!(messages[10]["content"], "a7");
    }

    #[test]
    fn model_and_temperature_overrides_land_in_body() {
        let req = AnswerRequest {
            prompt: "q",
            size: ResponseSize::Small,
            history: &[],
            model: Some("gpt-4o"),
            temperature: Some(0.2),
        };
        let body = OpenAiProvider::build_body(&req);

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["temperature"], 0.2);
    }

    #[test]
    fn extract_answer_reads_first_choice() {
        let response = json!({
            "choices": [{ "message": { "role": "assistant", "content": "Use the borrow checker." } }]
        });
        assert_eq!(
            OpenAiProvider::extract_answer(&response).unwrap(),
            "Use the borrow checker."
        );
    }

    #[test]
    fn extract_answer_rejects_malformed_response() {
        let response = json!({ "error": { "message": "invalid key" } });
        let err = OpenAiProvider::extract_answer(&response).unwrap_err();
        assert!(err.to_string().contains("unexpected OpenAI response"));
    }
}
