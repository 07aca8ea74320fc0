//! Server-sent events parsing for streamed provider responses
//!
//! Events are separated by blank lines. Only `data:` fields carry payload;
//! comments (`:` lines), `id:`, and `retry:` are ignored, and `event: ping`
//! or `data: [PING]` keep-alives are dropped.

use crate::chat::decoder::Utf8StreamDecoder;
use crate::error::{DuelError, Result};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

/// Incremental SSE parser
///
/// # Examples
///
/// ```
/// use device_duel::providers::sse::SseParser;
///
/// let mut parser = SseParser::new();
/// assert!(parser.push(b"data: {\"a\":").unwrap().is_empty());
/// assert_eq!(parser.push(b"1}\n\n").unwrap(), vec!["{\"a\":1}".to_string()]);
/// ```
#[derive(Debug, Default)]
pub struct SseParser {
    decoder: Utf8StreamDecoder,
    buffer: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning the data payload of every completed event
    ///
    /// # Errors
    ///
    /// Returns [`DuelError::Decode`] if the body is not valid UTF-8.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>> {
        let text = self.decoder.decode(chunk)?;
        self.buffer.push_str(&text);
        if self.buffer.contains('\r') {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..pos + 2).collect();
            if let Some(data) = event_data(&block[..pos]) {
                events.push(data);
            }
        }
        Ok(events)
    }

    /// Flush a trailing event that was not followed by a blank line
    ///
    /// # Errors
    ///
    /// Returns [`DuelError::Decode`] if the body ended mid-character.
    pub fn finish(self) -> Result<Option<String>> {
        self.decoder.finish()?;
        Ok(event_data(&self.buffer))
    }
}

/// Extract the joined `data:` value of one event block
fn event_data(block: &str) -> Option<String> {
    let mut data_lines: Vec<&str> = Vec::new();
    let mut event_type: Option<&str> = None;

    for line in block.lines() {
        if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.strip_prefix(' ').unwrap_or(value));
        } else if let Some(value) = line.strip_prefix("event:") {
            event_type = Some(value.trim());
        }
    }

    if event_type.map_or(false, |event| event.eq_ignore_ascii_case("ping")) {
        return None;
    }

    let data = data_lines.join("\n");
    if data.trim().is_empty() || data.trim().eq_ignore_ascii_case("[ping]") {
        return None;
    }
    Some(data)
}

/// Parse an SSE byte stream and forward complete `data:` payloads to
/// `events_tx`
///
/// Intended to run inside `tokio::spawn`. A body read error or decode error
/// is forwarded as a single `Err` item and ends parsing. Parsing also stops
/// when the receiver is dropped.
pub async fn parse_sse_stream<S, E>(byte_stream: S, events_tx: mpsc::Sender<Result<String>>)
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: std::fmt::Display,
{
    let mut parser = SseParser::new();
    tokio::pin!(byte_stream);

    while let Some(chunk) = byte_stream.next().await {
        let events = match chunk {
            Ok(bytes) => parser.push(&bytes),
            Err(e) => Err(DuelError::Provider(format!("stream read failed: {}", e)).into()),
        };

        match events {
            Ok(events) => {
                for data in events {
                    if events_tx.send(Ok(data)).await.is_err() {
                        tracing::debug!("SSE receiver dropped, stopping parser");
                        return;
                    }
                }
            }
            Err(e) => {
                let _ = events_tx.send(Err(e)).await;
                return;
            }
        }
    }

    match parser.finish() {
        Ok(Some(data)) => {
            let _ = events_tx.send(Ok(data)).await;
        }
        Ok(None) => {}
        Err(e) => {
            let _ = events_tx.send(Err(e)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(parts: &[&[u8]]) -> impl Stream<Item = std::result::Result<Bytes, String>> {
        let items: Vec<std::result::Result<Bytes, String>> = parts
            .iter()
            .map(|part| Ok(Bytes::copy_from_slice(part)))
            .collect();
        futures::stream::iter(items)
    }

    async fn collect(rx: &mut mpsc::Receiver<Result<String>>) -> Vec<Result<String>> {
        let mut out = Vec::new();
        while let Some(item) = rx.recv().await {
            out.push(item);
        }
        out
    }

    #[test]
    fn test_single_event() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data: {\"x\":1}\n\n").unwrap();
        assert_eq!(events, vec!["{\"x\":1}"]);
    }

    #[test]
    fn test_two_events_one_chunk() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data: first\n\ndata: second\n\n").unwrap();
        assert_eq!(events, vec!["first", "second"]);
    }

    #[test]
    fn test_crlf_delimiters_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"data: one\r\n\r").unwrap().is_empty());
        assert_eq!(parser.push(b"\ndata: two\r\n\r\n").unwrap(), vec!["one", "two"]);
    }

    #[test]
    fn test_multiline_data_joined() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data: a\ndata: b\n\n").unwrap();
        assert_eq!(events, vec!["a\nb"]);
    }

    #[test]
    fn test_ping_and_comments_dropped() {
        let mut parser = SseParser::new();
        let events = parser
            .push(b": keep-alive\n\nevent: ping\ndata: x\n\ndata: [PING]\n\nid: 7\ndata: real\n\n")
            .unwrap();
        assert_eq!(events, vec!["real"]);
    }

    #[test]
    fn test_finish_flushes_trailing_event() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"data: tail").unwrap().is_empty());
        assert_eq!(parser.finish().unwrap(), Some("tail".to_string()));
    }

    #[tokio::test]
    async fn test_parse_sse_stream_forwards_events() {
        let (tx, mut rx) = mpsc::channel(8);
        parse_sse_stream(chunks(&[&b"data: hel"[..], &b"lo\n\ndata: world\n\n"[..]]), tx).await;

        let events: Vec<String> = collect(&mut rx)
            .await
            .into_iter()
            .map(|item| item.unwrap())
            .collect();
        assert_eq!(events, vec!["hello", "world"]);
    }

    #[tokio::test]
    async fn test_parse_sse_stream_forwards_read_error() {
        let items: Vec<std::result::Result<Bytes, String>> = vec![
            Ok(Bytes::from_static(b"data: ok\n\n")),
            Err("connection reset".to_string()),
            Ok(Bytes::from_static(b"data: unreachable\n\n")),
        ];
        let (tx, mut rx) = mpsc::channel(8);
        parse_sse_stream(futures::stream::iter(items), tx).await;

        let events = collect(&mut rx).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].as_ref().unwrap(), "ok");
        assert!(events[1]
            .as_ref()
            .unwrap_err()
            .to_string()
            .contains("connection reset"));
    }

    #[tokio::test]
    async fn test_parse_sse_stream_stops_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        parse_sse_stream(chunks(&[&b"data: a\n\ndata: b\n\n"[..]]), tx).await;
    }
}
