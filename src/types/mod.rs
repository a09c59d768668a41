// Public modules
pub mod chat_completion;
pub mod chat_completion_chunk;
pub mod chat_completion_params;
pub mod chat_message;
pub mod stream_fragment;
pub mod usage;

// Re-exports
pub use chat_completion::{ChatCompletion, CompletionChoice, CompletionMessage};
pub use chat_completion_chunk::{ChatCompletionChunk, ChunkChoice, ChunkDelta};
pub use chat_completion_params::ChatCompletionParams;
pub use chat_message::{ChatMessage, Role};
pub use stream_fragment::StreamFragment;
pub use usage::Usage;
