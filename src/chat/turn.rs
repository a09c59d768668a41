//! Execution of a single conversation turn.
//!
//! A turn appends the user's message, asks the transport for a reply (streamed when preferred,
//! falling back to a single request if streaming fails), and appends the assistant's reply.

use std::time::Instant;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::chat::history::MessageHistory;
use crate::error::{Error, Result};
use crate::observability::{TURN_DURATION, TURN_ERRORS, TURN_FALLBACKS, TURNS};
use crate::render::OutputSink;
use crate::transport::{ChatTransport, Completion, FragmentStream};
use crate::types::{ChatCompletionParams, ChatMessage, StreamFragment};

/// How the reply of a turn was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Streamed fragment by fragment.
    Streamed,
    /// Fetched in one request, as asked.
    Complete,
    /// Streaming failed and the reply was fetched in one request instead.
    FellBack,
}

/// The result of a successful turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// The assistant's reply, exactly as appended to the history.
    pub text: String,
    /// How the reply arrived.
    pub delivery: Delivery,
}

/// Drives one transport to turn user messages into assistant replies.
pub struct TurnExecutor<T: ChatTransport> {
    transport: T,
    model: String,
}

impl<T: ChatTransport> TurnExecutor<T> {
    /// Creates an executor that asks `transport` for replies from `model`.
    pub fn new(transport: T, model: impl Into<String>) -> Self {
        Self {
            transport,
            model: model.into(),
        }
    }

    /// The model or deployment replies are requested from.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Runs one turn.
    ///
    /// This method:
    /// 1. Adds the user message to history
    /// 2. Streams the reply to `sink` if `stream` is set, falling back to a single request if
    ///    anything goes wrong while streaming
    /// 3. Otherwise requests the whole reply and writes it to `sink` once
    /// 4. Adds the assistant reply to history
    ///
    /// Text already streamed to `sink` before a fallback is not retracted.  `user_text` must not
    /// be blank; callers filter blank input.
    ///
    /// # Errors
    ///
    /// Returns an error if the single-request path fails, or [`Error::Abort`] if `cancel` fires.
    /// On error the history is left as it was before the turn.
    pub async fn execute(
        &self,
        history: &mut MessageHistory,
        user_text: &str,
        stream: bool,
        sink: &mut dyn OutputSink,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome> {
        debug_assert!(!user_text.trim().is_empty(), "blank turns are filtered by the caller");
        TURNS.click();
        let start = Instant::now();
        let previous_len = history.len();

        history.append(ChatMessage::user(user_text));
        let result = self.deliver(history, stream, sink, cancel).await;
        TURN_DURATION.add(start.elapsed().as_secs_f64());

        match result {
            Ok(outcome) => {
                history.append(ChatMessage::assistant(outcome.text.clone()));
                tracing::debug!(
                    delivery = ?outcome.delivery,
                    chars = outcome.text.len(),
                    messages = history.len(),
                    "turn complete"
                );
                Ok(outcome)
            }
            Err(err) => {
                TURN_ERRORS.click();
                history.rollback_to(previous_len);
                Err(err)
            }
        }
    }

    async fn deliver(
        &self,
        history: &MessageHistory,
        stream: bool,
        sink: &mut dyn OutputSink,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome> {
        if stream {
            match self.stream_reply(history, sink, cancel).await {
                Ok(text) => {
                    return Ok(TurnOutcome {
                        text,
                        delivery: Delivery::Streamed,
                    });
                }
                Err(err) if err.is_abort() => return Err(err),
                Err(err) => {
                    TURN_FALLBACKS.click();
                    tracing::warn!(error = %err, "streaming failed; requesting the whole reply instead");
                }
            }
            let text = self.complete_reply(history, sink, cancel).await?;
            return Ok(TurnOutcome {
                text,
                delivery: Delivery::FellBack,
            });
        }

        let text = self.complete_reply(history, sink, cancel).await?;
        Ok(TurnOutcome {
            text,
            delivery: Delivery::Complete,
        })
    }

    async fn stream_reply(
        &self,
        history: &MessageHistory,
        sink: &mut dyn OutputSink,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let mut fragments = match self.request(history, true, cancel).await? {
            Completion::Stream(fragments) => fragments,
            Completion::Text(text) => {
                sink.emit_line(&text);
                return Ok(text);
            }
        };

        let mut collected = String::new();
        let result = consume(&mut fragments, cancel, |text| {
            sink.emit(text);
            collected.push_str(text);
        })
        .await;

        match result {
            Ok(()) => {
                sink.emit_line("");
                Ok(collected)
            }
            Err(err) => {
                // Keep whatever partial output was shown on its own line.
                if !collected.is_empty() {
                    sink.emit_line("");
                }
                Err(err)
            }
        }
    }

    async fn complete_reply(
        &self,
        history: &MessageHistory,
        sink: &mut dyn OutputSink,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let text = match self.request(history, false, cancel).await? {
            Completion::Text(text) => text,
            Completion::Stream(mut fragments) => {
                let mut collected = String::new();
                consume(&mut fragments, cancel, |text| collected.push_str(text)).await?;
                collected
            }
        };
        sink.emit_line(&text);
        Ok(text)
    }

    async fn request(
        &self,
        history: &MessageHistory,
        stream: bool,
        cancel: &CancellationToken,
    ) -> Result<Completion> {
        let params =
            ChatCompletionParams::new(self.model.clone(), history.messages().to_vec())
                .with_stream(stream);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::abort("interrupted while waiting for the endpoint")),
            result = self.transport.complete(params) => result,
        }
    }
}

/// Feed every text fragment of `fragments` to `on_text` in arrival order.
///
/// Malformed and empty fragments are skipped.  Stops at the first error or when `cancel` fires.
async fn consume(
    fragments: &mut FragmentStream,
    cancel: &CancellationToken,
    mut on_text: impl FnMut(&str),
) -> Result<()> {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::abort("interrupted while streaming")),
            next = fragments.next() => next,
        };
        match next {
            None => return Ok(()),
            Some(Ok(StreamFragment::Malformed(reason))) => {
                tracing::debug!(%reason, "skipping malformed stream fragment");
            }
            Some(Ok(fragment)) => {
                if let Some(text) = fragment.text() {
                    on_text(text);
                }
            }
            Some(Err(err)) => return Err(err),
        }
    }
}
