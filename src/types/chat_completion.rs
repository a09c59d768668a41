use serde::{Deserialize, Serialize};

use crate::types::{Role, Usage};

/// The message carried by a non-streaming choice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionMessage {
    /// Usually `assistant`.
    pub role: Option<Role>,

    /// Reply text.  Endpoints send `null` when the reply is empty or filtered.
    #[serde(default)]
    pub content: Option<String>,
}

/// One alternative reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionChoice {
    /// Position of this choice in the response.
    #[serde(default)]
    pub index: u32,

    /// The reply.
    pub message: CompletionMessage,

    /// Why generation stopped.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// A complete, non-streaming chat completion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletion {
    /// Response identifier.
    #[serde(default)]
    pub id: Option<String>,

    /// The model that served the request.
    #[serde(default)]
    pub model: Option<String>,

    /// Alternative replies; the first one is used.
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,

    /// Token accounting, when reported.
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatCompletion {
    /// The text of the first choice, with a missing body read as the empty string.
    ///
    /// Returns `None` when the response carries no choices at all.
    pub fn first_text(&self) -> Option<&str> {
        self.choices
            .first()
            .map(|choice| choice.message.content.as_deref().unwrap_or(""))
    }
}
