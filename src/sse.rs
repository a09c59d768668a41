//! Server-Sent Events (SSE) processing for streaming responses.
//!
//! This module turns the raw byte stream of a streaming `/chat/completions` response into
//! [`StreamFragment`]s.  Events are separated by a blank line, payloads arrive on `data:` lines,
//! and `data: [DONE]` ends the stream.

use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::client_logger::ClientLogger;
use crate::observability::{STREAM_BYTES, STREAM_ERRORS, STREAM_EVENTS, STREAM_MALFORMED};
use crate::types::{ChatCompletionChunk, StreamFragment};
use crate::{Error, Result};

/// The end-of-stream sentinel sent by OpenAI-compatible endpoints.
const DONE_SENTINEL: &str = "[DONE]";

/// What a single SSE event block amounts to.
#[derive(Debug)]
enum SseEvent {
    /// A fragment (or a failure) to hand to the consumer.
    Item(Result<StreamFragment>),
    /// A comment, keep-alive, or event without data.
    Skip,
    /// The `[DONE]` sentinel.
    Done,
}

struct SseState<S> {
    stream: S,
    buffer: Vec<u8>,
    finished: bool,
    logger: Option<Arc<dyn ClientLogger>>,
}

/// Process a stream of bytes into a stream of reply fragments.
///
/// Bytes are buffered until a complete event is available, so events and multi-byte characters
/// may be split across network chunks arbitrarily.  The returned stream ends after `[DONE]`,
/// after the underlying stream ends, or after the first error.
pub fn process_sse<S, E>(
    byte_stream: S,
    logger: Option<Arc<dyn ClientLogger>>,
) -> impl Stream<Item = Result<StreamFragment>> + Send + 'static
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let state = SseState {
        stream: byte_stream,
        buffer: Vec::new(),
        finished: false,
        logger,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if state.finished {
                return None;
            }

            // First check if we have a complete event in the buffer
            if let Some((block, remaining)) = split_event(&state.buffer) {
                state.buffer = remaining;
                match parse_event(&block, state.logger.as_deref()) {
                    SseEvent::Item(item) => {
                        if item.is_err() {
                            state.finished = true;
                        }
                        return Some((record(item), state));
                    }
                    SseEvent::Skip => continue,
                    SseEvent::Done => return None,
                }
            }

            // Read more data
            match state.stream.next().await {
                Some(Ok(bytes)) => {
                    STREAM_BYTES.count(bytes.len() as u64);
                    state.buffer.extend_from_slice(&bytes);
                }
                Some(Err(e)) => {
                    state.finished = true;
                    let err =
                        Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e)));
                    return Some((record(Err(err)), state));
                }
                None => {
                    // End of stream; an unterminated trailing event still counts
                    state.finished = true;
                    let block = std::mem::take(&mut state.buffer);
                    return match parse_event(&block, state.logger.as_deref()) {
                        SseEvent::Item(item) => Some((record(item), state)),
                        SseEvent::Skip | SseEvent::Done => None,
                    };
                }
            }
        }
    })
}

fn record(item: Result<StreamFragment>) -> Result<StreamFragment> {
    STREAM_EVENTS.click();
    match &item {
        Ok(StreamFragment::Malformed(_)) => STREAM_MALFORMED.click(),
        Err(_) => STREAM_ERRORS.click(),
        Ok(_) => {}
    }
    item
}

/// Split off the first complete event, i.e. everything before the first blank line.
///
/// Accepts both `\n\n` and `\r\n\r\n` framing.
fn split_event(buffer: &[u8]) -> Option<(Vec<u8>, Vec<u8>)> {
    let mut line_start = 0;
    for (i, byte) in buffer.iter().enumerate() {
        if *byte == b'\n' {
            let line = &buffer[line_start..i];
            if line.is_empty() || line == b"\r" {
                return Some((buffer[..line_start].to_vec(), buffer[i + 1..].to_vec()));
            }
            line_start = i + 1;
        }
    }
    None
}

/// Interpret one event block.
fn parse_event(block: &[u8], logger: Option<&dyn ClientLogger>) -> SseEvent {
    let text = match std::str::from_utf8(block) {
        Ok(text) => text,
        Err(e) => {
            return SseEvent::Item(Err(Error::encoding(
                format!("Invalid UTF-8 in stream: {e}"),
                Some(Box::new(e)),
            )));
        }
    };

    let mut event_type = None;
    let mut data_lines = Vec::new();
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.starts_with(':') {
            continue;
        }
        if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.strip_prefix(' ').unwrap_or(value));
        } else if let Some(value) = line.strip_prefix("event:") {
            event_type = Some(value.trim());
        }
    }

    if data_lines.is_empty() {
        return SseEvent::Skip;
    }
    let data = data_lines.join("\n");
    if data.trim() == DONE_SENTINEL {
        return SseEvent::Done;
    }
    if event_type == Some("error") {
        return SseEvent::Item(Err(Error::api(
            500,
            Some("stream_error".to_string()),
            data,
            None,
        )));
    }

    let value = match serde_json::from_str::<serde_json::Value>(&data) {
        Ok(value) => value,
        Err(e) => {
            return SseEvent::Item(Err(Error::serialization(
                format!("Failed to parse event JSON: {e}"),
                Some(Box::new(e)),
            )));
        }
    };

    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(String::from)
            .unwrap_or_else(|| error.to_string());
        let error_type = error
            .get("type")
            .and_then(|t| t.as_str())
            .map(String::from);
        return SseEvent::Item(Err(Error::api(500, error_type, message, None)));
    }

    match serde_json::from_value::<ChatCompletionChunk>(value) {
        Ok(chunk) => {
            if let Some(logger) = logger {
                logger.log_stream_chunk(&chunk);
            }
            SseEvent::Item(Ok(chunk.into_fragment()))
        }
        Err(e) => SseEvent::Item(Ok(StreamFragment::Malformed(format!(
            "unexpected chunk shape: {e}"
        )))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    type Chunks = stream::Iter<std::vec::IntoIter<std::result::Result<Bytes, io::Error>>>;

    fn chunks(parts: &[&[u8]]) -> Chunks {
        let parts: Vec<_> = parts
            .iter()
            .map(|part| Ok(Bytes::copy_from_slice(part)))
            .collect();
        stream::iter(parts)
    }

    async fn collect(parts: &[&[u8]]) -> Vec<Result<StreamFragment>> {
        process_sse(chunks(parts), None).collect().await
    }

    fn text_event(text: &str) -> String {
        format!("data: {{\"choices\":[{{\"index\":0,\"delta\":{{\"content\":\"{text}\"}}}}]}}\n\n")
    }

    #[tokio::test]
    async fn parse_text_events_until_done() {
        let body = format!("{}{}data: [DONE]\n\n", text_event("he"), text_event("llo"));
        let events = collect(&[body.as_bytes()]).await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].as_ref().unwrap(), &StreamFragment::Text("he".to_string()));
        assert_eq!(events[1].as_ref().unwrap(), &StreamFragment::Text("llo".to_string()));
    }

    #[tokio::test]
    async fn chunks_outlive_the_borrowed_parts() {
        let stream = {
            let body = text_event("owned");
            process_sse(chunks(&[body.as_bytes()]), None)
        };
        let events: Vec<_> = stream.collect().await;
        assert_eq!(events[0].as_ref().unwrap(), &StreamFragment::Text("owned".to_string()));
    }

    #[tokio::test]
    async fn nothing_after_done_is_read() {
        let body = format!("data: [DONE]\n\n{}", text_event("late"));
        let events = collect(&[body.as_bytes()]).await;
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn handle_split_event() {
        let body = text_event("hello");
        let (first, second) = body.as_bytes().split_at(17);
        let events = collect(&[first, second]).await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap(), &StreamFragment::Text("hello".to_string()));
    }

    #[tokio::test]
    async fn handle_split_multibyte_character() {
        let body = text_event("héllo");
        let bytes = body.as_bytes();
        let split = body.find('é').unwrap() + 1;
        let events = collect(&[&bytes[..split], &bytes[split..]]).await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap(), &StreamFragment::Text("héllo".to_string()));
    }

    #[tokio::test]
    async fn handle_crlf_framing() {
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\r\n\r\ndata: [DONE]\r\n\r\n";
        let events = collect(&[body.as_bytes()]).await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap(), &StreamFragment::Text("hi".to_string()));
    }

    #[tokio::test]
    async fn comments_and_keepalives_are_skipped() {
        let body = format!(": keep-alive\n\nevent: ping\n\n{}", text_event("x"));
        let events = collect(&[body.as_bytes()]).await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap(), &StreamFragment::Text("x".to_string()));
    }

    #[tokio::test]
    async fn role_only_chunk_is_empty_fragment() {
        let body = b"data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n";
        let events = collect(&[body]).await;
        assert_eq!(events[0].as_ref().unwrap(), &StreamFragment::Empty);
    }

    #[tokio::test]
    async fn wrong_shape_is_malformed_not_error() {
        let body = format!("data: {{\"choices\":42}}\n\n{}", text_event("ok"));
        let events = collect(&[body.as_bytes()]).await;

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Ok(StreamFragment::Malformed(_))));
        assert_eq!(events[1].as_ref().unwrap(), &StreamFragment::Text("ok".to_string()));
    }

    #[tokio::test]
    async fn invalid_json_is_error_and_ends_stream() {
        let body = format!("data: {{not json\n\n{}", text_event("never"));
        let events = collect(&[body.as_bytes()]).await;

        assert_eq!(events.len(), 1);
        let err = events[0].as_ref().unwrap_err();
        assert!(err.to_string().contains("Failed to parse event JSON"));
    }

    #[tokio::test]
    async fn error_object_is_error() {
        let body = b"data: {\"error\":{\"message\":\"quota exceeded\",\"type\":\"insufficient_quota\"}}\n\n";
        let events = collect(&[body]).await;

        assert_eq!(events.len(), 1);
        let err = events[0].as_ref().unwrap_err();
        assert_eq!(err.to_string(), "insufficient_quota: quota exceeded");
    }

    #[tokio::test]
    async fn transport_error_ends_stream() {
        let parts: Vec<std::result::Result<Bytes, io::Error>> = vec![
            Ok(Bytes::from(text_event("par"))),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
            Ok(Bytes::from(text_event("never"))),
        ];
        let events: Vec<_> = process_sse(stream::iter(parts), None).collect().await;

        assert_eq!(events.len(), 2);
        assert!(events[0].is_ok());
        assert!(matches!(events[1], Err(Error::Streaming { .. })));
    }

    #[tokio::test]
    async fn trailing_event_without_blank_line() {
        let body = b"data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}";
        let events = collect(&[body]).await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap(), &StreamFragment::Text("tail".to_string()));
    }
}
