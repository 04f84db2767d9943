//! Server-Sent Events decoding for streaming model responses.
//!
//! ```text
//! data: {"key": "value"}
//!
//! data: [DONE]
//! ```

use futures::stream::{self, Stream, StreamExt};

use crate::client::ClientError;

/// Incremental line decoder for an SSE byte stream.
///
/// Bytes may split lines (and UTF-8 sequences) arbitrarily; complete `data:` payloads are
/// released as soon as their line ends.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the `[DONE]` marker has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed a chunk of bytes and return the data payloads it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.take_line(&line, &mut events);
        }
        events
    }

    /// Flush a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Vec<String> {
        let line = std::mem::take(&mut self.buffer);
        let mut events = Vec::new();
        self.take_line(&line, &mut events);
        events
    }

    fn take_line(&mut self, line: &[u8], events: &mut Vec<String>) {
        if self.done {
            return;
        }
        let line = String::from_utf8_lossy(line);
        if let Some(data) = parse_sse_line(line.trim()) {
            if is_done_marker(data) {
                self.done = true;
            } else if !data.is_empty() {
                events.push(data.to_string());
            }
        }
    }
}

/// Extension trait turning a `reqwest::Response` into a stream of SSE data payloads.
pub trait SSEResponseExt {
    /// Stops at the `[DONE]` marker or when the body ends.
    fn sse(self) -> impl Stream<Item = Result<String, ClientError>> + Send;
}

impl SSEResponseExt for reqwest::Response {
    fn sse(self) -> impl Stream<Item = Result<String, ClientError>> + Send {
        let bytes = Box::pin(self.bytes_stream());

        stream::unfold(
            (bytes, SseDecoder::new(), false),
            |(mut bytes, mut decoder, ended)| async move {
                if ended || decoder.is_done() {
                    return None;
                }
                let (items, ended): (Vec<Result<String, ClientError>>, bool) = match bytes.next().await {
                    Some(Ok(chunk)) => (decoder.feed(&chunk).into_iter().map(Ok).collect(), false),
                    Some(Err(e)) => (vec![Err(ClientError::from(e))], true),
                    None => (decoder.finish().into_iter().map(Ok).collect(), true),
                };
                Some((stream::iter(items), (bytes, decoder, ended)))
            },
        )
        .flatten()
    }
}

/// Extract the payload of a `data:` line.
pub fn parse_sse_line(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim)
}

pub fn is_done_marker(data: &str) -> bool {
    data == "[DONE]"
}
