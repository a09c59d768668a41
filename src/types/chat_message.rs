use std::fmt;

use serde::{Deserialize, Serialize};

/// Role tag for a conversation message.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions that frame the whole conversation.
    System,

    /// User role.
    User,

    /// Assistant role.
    Assistant,
}

impl Role {
    /// The role as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One role-tagged turn of a conversation.
///
/// Messages are never edited once they are part of a history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// The role of the message.
    pub role: Role,

    /// The text of the message.
    pub content: String,
}

impl ChatMessage {
    /// Create a new `ChatMessage` with the given role and content.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

impl From<&str> for ChatMessage {
    fn from(content: &str) -> Self {
        Self::user(content)
    }
}

impl From<String> for ChatMessage {
    fn from(content: String) -> Self {
        Self::user(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn message_serialization() {
        let message = ChatMessage::assistant("Hi there");
        assert_eq!(
            to_value(&message).unwrap(),
            json!({
                "role": "assistant",
                "content": "Hi there"
            })
        );
    }

    #[test]
    fn message_deserialization() {
        let message: ChatMessage = serde_json::from_value(json!({
            "role": "system",
            "content": "Be terse."
        }))
        .unwrap();
        assert_eq!(message, ChatMessage::system("Be terse."));
    }

    #[test]
    fn from_str_is_user() {
        let message = ChatMessage::from("hello");
        assert_eq!(message.role, Role::User);
        assert_eq!(message.content, "hello");
    }
}
