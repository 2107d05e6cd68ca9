//! Append-only transcript of the map chat panel.

use serde::{Deserialize, Serialize};

use crate::grounding::Citation;

/// One exchanged chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    User {
        text: String,
    },
    Assistant {
        text: String,
        citations: Vec<Citation>,
    },
}

impl Message {
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::User { text } | Self::Assistant { text, .. } => text,
        }
    }

    #[must_use]
    pub const fn is_user(&self) -> bool {
        matches!(self, Self::User { .. })
    }
}

/// The answer to a grounded map query, ready for appending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    pub answer_text: String,
    pub citations: Vec<Citation>,
}

/// Ordered, append-only message log. Entries are never mutated, reordered,
/// or removed for the lifetime of the view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    entries: Vec<Message>,
}

impl Conversation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_user(&mut self, text: impl Into<String>) {
        self.entries.push(Message::User { text: text.into() });
    }

    pub fn append_assistant(&mut self, result: QueryResult) {
        self.entries.push(Message::Assistant {
            text: result.answer_text,
            citations: result.citations,
        });
    }

    #[must_use]
    pub fn snapshot(&self) -> &[Message] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
