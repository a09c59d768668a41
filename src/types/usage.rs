use serde::{Deserialize, Serialize};

/// Token accounting reported by the endpoint.
///
/// Some endpoints send `null` for counts they do not track, so every count is optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt, history included.
    #[serde(default)]
    pub prompt_tokens: Option<u32>,

    /// Tokens generated for the reply.
    #[serde(default)]
    pub completion_tokens: Option<u32>,

    /// Sum of the two.
    #[serde(default)]
    pub total_tokens: Option<u32>,
}
