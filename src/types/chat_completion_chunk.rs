use serde::{Deserialize, Serialize};

use crate::types::{Role, StreamFragment, Usage};

/// Incremental content carried by a streaming choice.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChunkDelta {
    /// Present on the first chunk only.
    #[serde(default)]
    pub role: Option<Role>,

    /// The next piece of reply text.
    #[serde(default)]
    pub content: Option<String>,
}

/// One streaming choice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkChoice {
    /// Position of this choice in the response.
    #[serde(default)]
    pub index: u32,

    /// The increment.
    #[serde(default)]
    pub delta: ChunkDelta,

    /// Set on the last chunk of a choice.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// A single `chat.completion.chunk` event from a streaming response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletionChunk {
    /// Response identifier, shared by every chunk of one response.
    #[serde(default)]
    pub id: Option<String>,

    /// The model that served the request.
    #[serde(default)]
    pub model: Option<String>,

    /// Azure sends an initial chunk with no choices carrying content-filter results.
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,

    /// Token accounting on the final chunk, when requested.
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatCompletionChunk {
    /// The text increment of the first choice, if it carries any.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.delta.content.as_deref())
            .filter(|text| !text.is_empty())
    }

    /// Normalize this chunk into a [`StreamFragment`].
    pub fn into_fragment(self) -> StreamFragment {
        match self.text() {
            Some(text) => StreamFragment::Text(text.to_string()),
            None => StreamFragment::Empty,
        }
    }
}
