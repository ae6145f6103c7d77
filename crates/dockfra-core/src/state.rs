//! UI-agnostic chat transcript types
//!
//! Messages arrive from the wizard server (`message` events) or are echoed
//! locally when the user dispatches an action. The transcript only grows.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A chat message in the wizard conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub role: ChatRole,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    Bot,
    User,
}

impl ChatMessage {
    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            id: None,
            role: ChatRole::Bot,
            text: text.into(),
            src: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: None,
            role: ChatRole::User,
            text: text.into(),
            src: None,
        }
    }

    /// Message was produced by the wizard's CLI shell rather than the web flow
    pub fn from_cli(&self) -> bool {
        self.src.as_deref() == Some("cli")
    }
}

/// Ordered, append-only list of chat messages with id-based deduplication
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    seen_ids: HashSet<String>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message. Returns false when a message with the same id was
    /// already appended (re-delivery after reconnect replays the conversation).
    pub fn push(&mut self, message: ChatMessage) -> bool {
        if let Some(id) = &message.id {
            if !self.seen_ids.insert(id.clone()) {
                return false;
            }
        }
        self.messages.push(message);
        true
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Plain-text export used by the chat copy button
    pub fn export(&self) -> String {
        self.messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    ChatRole::Bot => "🤖 Bot",
                    ChatRole::User => "👤 User",
                };
                format!("{}: {}", role, m.text)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_id(id: &str, text: &str) -> ChatMessage {
        ChatMessage {
            id: Some(id.to_string()),
            ..ChatMessage::bot(text)
        }
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let mut transcript = Transcript::new();
        assert!(transcript.push(with_id("msg-0", "first")));
        assert!(!transcript.push(with_id("msg-0", "second")));
        assert!(!transcript.push(with_id("msg-0", "third")));
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.messages()[0].text, "first");
    }

    #[test]
    fn test_messages_without_id_always_append() {
        let mut transcript = Transcript::new();
        transcript.push(ChatMessage::user("hi"));
        transcript.push(ChatMessage::user("hi"));
        assert_eq!(transcript.len(), 2);
    }

    #[test]
    fn test_deserialize_message_event() {
        let msg: ChatMessage =
            serde_json::from_str(r#"{"id":"msg-3","role":"bot","text":"ok","src":"cli"}"#).unwrap();
        assert_eq!(msg.role, ChatRole::Bot);
        assert!(msg.from_cli());

        let bare: ChatMessage = serde_json::from_str(r#"{"role":"user"}"#).unwrap();
        assert_eq!(bare.text, "");
        assert!(bare.id.is_none());
    }

    #[test]
    fn test_export_labels_roles() {
        let mut transcript = Transcript::new();
        transcript.push(ChatMessage::bot("Witaj"));
        transcript.push(ChatMessage::user("launch"));
        assert_eq!(transcript.export(), "🤖 Bot: Witaj\n\n👤 User: launch");
    }
}
