//! Conversation history shared between the answer pipeline and the UI.
//!
//! History grows strictly in pairs: one user turn (the transcript) followed
//! by one assistant turn (the answer or an error placeholder). The pair is
//! appended under a single lock so readers never observe a dangling question.

use std::sync::{Arc, Mutex};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

/// Cheaply cloneable handle to the shared transcript/answer log.
#[derive(Clone, Default)]
pub struct ConversationHistory {
    turns: Arc<Mutex<Vec<Turn>>>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a question/answer pair atomically.
    pub fn push_exchange(&self, question: &str, answer: &str) {
        if let Ok(mut turns) = self.turns.lock() {
            turns.push(Turn {
                role: Role::User,
                text: question.to_string(),
            });
            turns.push(Turn {
                role: Role::Assistant,
                text: answer.to_string(),
            });
        }
    }

    /// The last `limit` turns, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<Turn> {
        self.turns
            .lock()
            .map(|turns| {
                let skip = turns.len().saturating_sub(limit);
                turns[skip..].to_vec()
            })
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut turns) = self.turns.lock() {
            turns.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.turns.lock().map(|turns| turns.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
