//! Chat log types - the scrolling conversation a character is played against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::rules::PromptRole;

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    #[default]
    User,
    #[serde(alias = "assistant")]
    Char,
    System,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Char => "char",
            ChatRole::System => "system",
        }
    }
}

/// Lore and depth prompts name their role from the model's point of view.
impl From<PromptRole> for ChatRole {
    fn from(role: PromptRole) -> Self {
        match role {
            PromptRole::System => ChatRole::System,
            PromptRole::User => ChatRole::User,
            PromptRole::Assistant => ChatRole::Char,
        }
    }
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message in the chat log.
///
/// The log is append-only within a turn; the engine only ever reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: ChatRole,

    /// Display name of the speaker, when known.
    #[serde(default, alias = "charname", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub content: String,

    /// When the message was sent (milliseconds since the epoch on the wire).
    #[serde(
        default,
        alias = "time_stamp",
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub time_stamp: Option<DateTime<Utc>>,
}

impl ChatMessage {
    /// Create a new message with no speaker name or timestamp.
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            name: None,
            content: content.into(),
            time_stamp: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn char(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Char, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }

    /// Set the speaker name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the timestamp.
    pub fn with_time_stamp(mut self, time_stamp: DateTime<Utc>) -> Self {
        self.time_stamp = Some(time_stamp);
        self
    }

    /// The label used when the message is rendered into a scan window:
    /// the speaker name, falling back to the role.
    pub fn speaker(&self) -> &str {
        self.name.as_deref().unwrap_or(self.role.as_str())
    }

    pub fn is_system(&self) -> bool {
        self.role == ChatRole::System
    }
}

/// Render messages as `"speaker: content"` lines.
pub fn format_transcript<'a>(messages: impl IntoIterator<Item = &'a ChatMessage>) -> String {
    messages
        .into_iter()
        .map(|m| format!("{}: {}", m.speaker(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_speaker_falls_back_to_role() {
        let named = ChatMessage::char("Hello").with_name("Alice");
        let anonymous = ChatMessage::user("Hi");

        assert_eq!(named.speaker(), "Alice");
        assert_eq!(anonymous.speaker(), "user");
    }

    #[test]
    fn test_role_from_prompt_role() {
        assert_eq!(ChatRole::from(PromptRole::Assistant), ChatRole::Char);
        assert_eq!(ChatRole::from(PromptRole::System), ChatRole::System);
        assert_eq!(ChatRole::from(PromptRole::User), ChatRole::User);
    }

    #[test]
    fn test_format_transcript() {
        let log = vec![
            ChatMessage::user("Where is the tower?").with_name("Bob"),
            ChatMessage::char("North of the river.").with_name("Alice"),
        ];

        assert_eq!(
            format_transcript(&log),
            "Bob: Where is the tower?\nAlice: North of the river."
        );
    }

    #[test]
    fn test_message_wire_format() {
        let json = r#"{"role":"assistant","charname":"Alice","content":"Hi","time_stamp":1700000000000}"#;
        let message: ChatMessage = serde_json::from_str(json).unwrap();

        assert_eq!(message.role, ChatRole::Char);
        assert_eq!(message.name.as_deref(), Some("Alice"));
        assert_eq!(
            message.time_stamp,
            Some(Utc.timestamp_millis_opt(1_700_000_000_000).unwrap())
        );

        let back = serde_json::to_value(&message).unwrap();
        assert_eq!(back["timeStamp"], 1_700_000_000_000_i64);
        assert_eq!(back["role"], "char");
    }
}
