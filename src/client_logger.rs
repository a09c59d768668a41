//! Logging hook for chat-completion client operations.
//!
//! This module provides the [`ClientLogger`] trait that allows users to capture every request
//! and response passing through the [`OpenAi`](crate::OpenAi) client, and
//! [`TracingClientLogger`], which forwards them to `tracing`.

use crate::types::{ChatCompletion, ChatCompletionChunk, ChatCompletionParams};

/// A trait for logging chat-completion client operations.
///
/// # Example
///
/// ```rust,ignore
/// use chatrelay::{ChatCompletion, ChatCompletionChunk, ChatCompletionParams, ClientLogger};
/// use std::sync::Mutex;
///
/// struct FileLogger {
///     file: Mutex<std::fs::File>,
/// }
///
/// impl ClientLogger for FileLogger {
///     fn log_request(&self, params: &ChatCompletionParams) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Request: {}", serde_json::to_string(params).unwrap()).unwrap();
///     }
///
///     fn log_completion(&self, completion: &ChatCompletion) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Response: {}", serde_json::to_string(completion).unwrap()).unwrap();
///     }
///
///     fn log_stream_chunk(&self, chunk: &ChatCompletionChunk) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Chunk: {}", serde_json::to_string(chunk).unwrap()).unwrap();
///     }
/// }
/// ```
pub trait ClientLogger: Send + Sync {
    /// Log a request just before it is sent.
    fn log_request(&self, params: &ChatCompletionParams);

    /// Log a complete response from a non-streaming call.
    fn log_completion(&self, completion: &ChatCompletion);

    /// Log an individual streaming chunk that parsed as a completion chunk.
    fn log_stream_chunk(&self, chunk: &ChatCompletionChunk);
}

/// A [`ClientLogger`] that emits `trace`-level `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingClientLogger;

impl ClientLogger for TracingClientLogger {
    fn log_request(&self, params: &ChatCompletionParams) {
        tracing::trace!(
            model = %params.model,
            messages = params.messages.len(),
            stream = params.stream,
            "chat completion request"
        );
    }

    fn log_completion(&self, completion: &ChatCompletion) {
        tracing::trace!(
            id = completion.id.as_deref().unwrap_or(""),
            choices = completion.choices.len(),
            total_tokens = completion.usage.and_then(|usage| usage.total_tokens),
            "chat completion response"
        );
    }

    fn log_stream_chunk(&self, chunk: &ChatCompletionChunk) {
        tracing::trace!(
            id = chunk.id.as_deref().unwrap_or(""),
            text = chunk.text().unwrap_or(""),
            "chat completion chunk"
        );
    }
}
