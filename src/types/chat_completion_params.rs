use serde::{Deserialize, Serialize};

use crate::types::ChatMessage;

/// Request body for `POST /chat/completions`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletionParams {
    /// Model name, or the deployment name on Azure.
    pub model: String,

    /// The full conversation so far, oldest first.
    pub messages: Vec<ChatMessage>,

    /// Whether the reply should arrive as server-sent events.
    #[serde(default)]
    pub stream: bool,
}

impl ChatCompletionParams {
    /// Create non-streaming parameters for the given model and messages.
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: false,
        }
    }

    /// Sets whether the reply is streamed.
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}
