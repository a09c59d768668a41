//! The boundary between the chat engine and a model-serving endpoint.
//!
//! The engine only ever sees [`ChatTransport::complete`].  Whatever the real endpoint sends is
//! normalized on this side of the boundary into either one final text or an ordered stream of
//! [`StreamFragment`]s, so the engine never inspects response shapes itself.

use std::fmt;
use std::pin::Pin;

use futures::Stream;

use crate::error::Result;
use crate::types::{ChatCompletionParams, StreamFragment};

/// A lazy, finite, non-restartable sequence of reply fragments in arrival order.
///
/// An `Err` item means the stream failed; no further items should be consumed after it.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<StreamFragment>> + Send>>;

/// What a completion call produced.
pub enum Completion {
    /// The whole reply at once.
    Text(String),

    /// The reply as it is generated.
    Stream(FragmentStream),
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Completion::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Completion::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// A handle on a chat-completion endpoint.
#[async_trait::async_trait]
pub trait ChatTransport: Send + Sync {
    /// Ask the endpoint for the next assistant reply.
    ///
    /// When `params.stream` is set the implementation returns [`Completion::Stream`]; otherwise
    /// it returns [`Completion::Text`].
    ///
    /// # Errors
    ///
    /// Fails on network failure, authentication failure, or a response of the wrong shape.
    async fn complete(&self, params: ChatCompletionParams) -> Result<Completion>;
}

#[async_trait::async_trait]
impl<T: ChatTransport + ?Sized> ChatTransport for &T {
    async fn complete(&self, params: ChatCompletionParams) -> Result<Completion> {
        (**self).complete(params).await
    }
}

#[async_trait::async_trait]
impl<T: ChatTransport + ?Sized> ChatTransport for Box<T> {
    async fn complete(&self, params: ChatCompletionParams) -> Result<Completion> {
        (**self).complete(params).await
    }
}
