//! A transport with canned replies for exercising the chat engine.

use std::collections::VecDeque;
use std::sync::Mutex;

use futures::stream;

use crate::error::{Error, Result};
use crate::transport::{ChatTransport, Completion};
use crate::types::{ChatCompletionParams, Role, StreamFragment};

/// Replies are scripted separately for streaming and non-streaming calls and consumed in order.
///
/// With [`ScriptedTransport::echoing`], calls made after the script runs out reply with
/// `echo: <last user message>`.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    streamed: Mutex<VecDeque<Result<Vec<Result<StreamFragment>>>>>,
    complete: Mutex<VecDeque<Result<String>>>,
    echo: bool,
    calls: Mutex<Vec<ChatCompletionParams>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn echoing() -> Self {
        Self {
            echo: true,
            ..Self::default()
        }
    }

    pub(crate) fn stream_reply(self, fragments: Vec<Result<StreamFragment>>) -> Self {
        self.streamed.lock().unwrap().push_back(Ok(fragments));
        self
    }

    pub(crate) fn stream_failure(self, err: Error) -> Self {
        self.streamed.lock().unwrap().push_back(Err(err));
        self
    }

    pub(crate) fn text_reply(self, text: &str) -> Self {
        self.complete.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub(crate) fn text_failure(self, err: Error) -> Self {
        self.complete.lock().unwrap().push_back(Err(err));
        self
    }

    /// Every request received so far.
    pub(crate) fn calls(&self) -> Vec<ChatCompletionParams> {
        self.calls.lock().unwrap().clone()
    }

    fn echo_of(params: &ChatCompletionParams) -> String {
        let last_user = params
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        format!("echo: {last_user}")
    }
}

#[async_trait::async_trait]
impl ChatTransport for ScriptedTransport {
    async fn complete(&self, params: ChatCompletionParams) -> Result<Completion> {
        self.calls.lock().unwrap().push(params.clone());
        if params.stream {
            let next = self.streamed.lock().unwrap().pop_front();
            match next {
                Some(Ok(fragments)) => Ok(Completion::Stream(Box::pin(stream::iter(fragments)))),
                Some(Err(err)) => Err(err),
                None if self.echo => {
                    let text = Self::echo_of(&params);
                    let fragments = vec![Ok(StreamFragment::Text(text))];
                    Ok(Completion::Stream(Box::pin(stream::iter(fragments))))
                }
                None => Err(Error::streaming("no scripted stream reply", None)),
            }
        } else {
            let next = self.complete.lock().unwrap().pop_front();
            match next {
                Some(reply) => reply.map(Completion::Text),
                None if self.echo => Ok(Completion::Text(Self::echo_of(&params))),
                None => Err(Error::connection("no scripted reply", None)),
            }
        }
    }
}
