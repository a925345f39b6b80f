//! Transcript messages and attachments supplied by the caller.
//!
//! The core never stores these; every turn receives the full ordered
//! transcript and re-derives everything from it.

use serde::{Deserialize, Serialize};

/// Role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// System instructions (typically invisible to user).
    System,
    /// User input.
    User,
    /// AI assistant response.
    Assistant,
}

/// One role-tagged message of the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// Ordered, role-tagged conversation history for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript(Vec<ChatMessage>);

impl Transcript {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self(messages)
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.0
    }

    /// True when there is no non-blank message at all.
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|m| m.content.trim().is_empty())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Messages written by the prospective client.
    pub fn user_messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.0.iter().filter(|m| m.role == Role::User)
    }

    pub fn assistant_messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.0.iter().filter(|m| m.role == Role::Assistant)
    }

    /// First non-blank user message, if any.
    pub fn first_user_message(&self) -> Option<&ChatMessage> {
        self.user_messages().find(|m| !m.content.trim().is_empty())
    }

    /// Newline-joined user text used by the deterministic heuristics.
    pub fn user_text(&self) -> String {
        self.user_messages()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Returns a copy extended with one more message.
    pub fn with_message(&self, message: ChatMessage) -> Self {
        let mut messages = self.0.clone();
        messages.push(message);
        Self(messages)
    }
}

impl From<Vec<ChatMessage>> for Transcript {
    fn from(messages: Vec<ChatMessage>) -> Self {
        Self(messages)
    }
}

/// File uploaded alongside a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub size: u64,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Transcript {
        Transcript::new(vec![
            ChatMessage::user("I need help"),
            ChatMessage::assistant("Sure, my email is help@firm.test"),
            ChatMessage::user("It's about my landlord"),
        ])
    }

    #[test]
    fn user_text_skips_assistant_messages() {
        let text = sample().user_text();
        assert_eq!(text, "I need help\nIt's about my landlord");
        assert!(!text.contains("help@firm.test"));
    }

    #[test]
    fn blank_messages_count_as_empty() {
        let t = Transcript::new(vec![ChatMessage::user("   "), ChatMessage::assistant("")]);
        assert!(t.is_empty());
        assert!(t.first_user_message().is_none());
        assert!(Transcript::default().is_empty());
    }

    #[test]
    fn with_message_leaves_original_untouched() {
        let t = sample();
        let extended = t.with_message(ChatMessage::user("more"));
        assert_eq!(t.len(), 3);
        assert_eq!(extended.len(), 4);
    }

    #[test]
    fn role_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
    }

    #[test]
    fn attachment_uses_type_key() {
        let json = r#"{"id":"f1","name":"lease.pdf","type":"application/pdf","size":1024,"url":"https://files.test/f1"}"#;
        let a: Attachment = serde_json::from_str(json).unwrap();
        assert_eq!(a.content_type, "application/pdf");
        assert_eq!(a.size, 1024);
    }
}
