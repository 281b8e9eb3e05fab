//! Incremental consumption of streamed text responses
//!
//! The chat endpoints answer with a chunked body of plain UTF-8 text, without
//! any framing. Chunk boundaries are arbitrary and may fall inside a
//! multi-byte character, so decoding carries state from one chunk to the next.

use std::pin::Pin;

use futures_util::stream::{self, Stream, StreamExt};

/// Why a streamed exchange did not complete
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("HTTP error! status: {0}")]
    Status(u16),
}

/// One step of a streamed exchange as seen by the message store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamUpdate {
    Fragment(String),
    Finished,
    Failed(StreamError),
}

/// Stateful UTF-8 decoder.
///
/// An incomplete sequence at the end of a chunk is held back until the next
/// chunk completes it. Invalid bytes decode to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(chunk);

        let mut out = String::with_capacity(buf.len());
        let mut rest: &[u8] = &buf;

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            self.pending = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Flush at end of stream. A dangling partial sequence becomes U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }
}

type FragmentState<S> = Option<(Pin<Box<S>>, Utf8Decoder)>;

/// Decode a byte stream into text fragments.
///
/// Yields one fragment per chunk that decodes to non-empty text. A transport
/// error is yielded once as `Err` and ends the stream.
pub fn text_fragments<S, B, E>(body: S) -> impl Stream<Item = Result<String, StreamError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let initial: FragmentState<S> = Some((Box::pin(body), Utf8Decoder::new()));

    stream::unfold(initial, |state| async move {
        let (mut body, mut decoder) = state?;
        loop {
            match body.next().await {
                Some(Ok(chunk)) => {
                    let text = decoder.decode(chunk.as_ref());
                    if !text.is_empty() {
                        return Some((Ok(text), Some((body, decoder))));
                    }
                }
                Some(Err(err)) => {
                    return Some((Err(StreamError::Transport(err.to_string())), None));
                }
                None => {
                    let tail = decoder.finish();
                    if tail.is_empty() {
                        return None;
                    }
                    return Some((Ok(tail), None));
                }
            }
        }
    })
}

/// Drive a fragment stream into `sink`.
///
/// Every fragment is handed over as soon as it is read, followed by exactly
/// one `Finished` or `Failed`. Returns false if the sink stopped accepting
/// updates before the end.
pub async fn pump<S, F>(fragments: S, mut sink: F) -> bool
where
    S: Stream<Item = Result<String, StreamError>>,
    F: FnMut(StreamUpdate) -> bool,
{
    futures_util::pin_mut!(fragments);

    while let Some(item) = fragments.next().await {
        match item {
            Ok(text) => {
                if !sink(StreamUpdate::Fragment(text)) {
                    return false;
                }
            }
            Err(err) => return sink(StreamUpdate::Failed(err)),
        }
    }

    sink(StreamUpdate::Finished)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{MessageStore, TurnId, TurnRole};
    use std::io;

    /// Stream an exchange straight into a store, the way the UI applies
    /// updates one event at a time.
    async fn consume<S>(store: &mut MessageStore, id: TurnId, fragments: S, failure_text: &str)
    where
        S: Stream<Item = Result<String, StreamError>>,
    {
        pump(fragments, |update| {
            store.apply(id, update, failure_text);
            true
        })
        .await;
    }

    fn chunks(parts: Vec<Vec<u8>>) -> impl Stream<Item = Result<Vec<u8>, io::Error>> + Send {
        stream::iter(parts.into_iter().map(Ok))
    }

    #[test]
    fn test_decoder_joins_split_character() {
        let bytes = "é".as_bytes();
        let mut decoder = Utf8Decoder::new();

        assert_eq!(decoder.decode(&bytes[..1]), "");
        assert_eq!(decoder.decode(&bytes[1..]), "é");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_decoder_every_split_point() {
        let text = "Bienvenue ✨ dans l’espace 🎭 « Et si… »";
        let bytes = text.as_bytes();

        for split in 0..=bytes.len() {
            let mut decoder = Utf8Decoder::new();
            let mut out = decoder.decode(&bytes[..split]);
            out.push_str(&decoder.decode(&bytes[split..]));
            out.push_str(&decoder.finish());
            assert_eq!(out, text, "split at byte {}", split);
        }
    }

    #[test]
    fn test_decoder_single_byte_chunks() {
        let text = "phénix 🔥";
        let mut decoder = Utf8Decoder::new();
        let out: String = text
            .as_bytes()
            .iter()
            .map(|b| decoder.decode(std::slice::from_ref(b)))
            .collect();
        assert_eq!(out, text);
    }

    #[test]
    fn test_decoder_replaces_invalid_bytes() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"a\xffb"), "a\u{FFFD}b");
    }

    #[test]
    fn test_decoder_flushes_dangling_sequence() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(&[b'o', 0xE2, 0x9C]), "o");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert_eq!(decoder.finish(), "");
    }

    #[tokio::test]
    async fn test_text_fragments_skips_empty_decodes() {
        let bytes = "ça".as_bytes().to_vec();
        let body = chunks(vec![bytes[..1].to_vec(), bytes[1..].to_vec()]);

        let fragments: Vec<_> = text_fragments(body).collect().await;
        assert_eq!(fragments, vec![Ok("ça".to_string())]);
    }

    #[tokio::test]
    async fn test_text_fragments_surfaces_transport_error() {
        let body = stream::iter(vec![
            Ok(b"hello ".to_vec()),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
            Ok(b"never".to_vec()),
        ]);

        let fragments: Vec<_> = text_fragments(body).collect().await;
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0], Ok("hello ".to_string()));
        assert!(matches!(fragments[1], Err(StreamError::Transport(_))));
    }

    #[tokio::test]
    async fn test_pump_reports_each_fragment_then_finish() {
        let fragments = stream::iter(vec![Ok("a".to_string()), Ok("b".to_string())]);
        let mut seen = Vec::new();

        let completed = pump(fragments, |update| {
            seen.push(update);
            true
        })
        .await;

        assert!(completed);
        assert_eq!(
            seen,
            vec![
                StreamUpdate::Fragment("a".into()),
                StreamUpdate::Fragment("b".into()),
                StreamUpdate::Finished,
            ]
        );
    }

    #[tokio::test]
    async fn test_pump_stops_when_sink_closes() {
        let fragments = stream::iter(vec![Ok("a".to_string()), Ok("b".to_string())]);
        let mut count = 0;

        let completed = pump(fragments, |_| {
            count += 1;
            false
        })
        .await;

        assert!(!completed);
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_consume_commits_concatenation() {
        let answer = "La colombe renaît ✨ de ses cendres 🔥";
        let bytes = answer.as_bytes();
        // Uneven chunk sizes so several boundaries land inside characters.
        let parts: Vec<Vec<u8>> = bytes.chunks(3).map(|c| c.to_vec()).collect();

        let mut store = MessageStore::with_greeting("hello");
        let exchange = store.submit("question").unwrap();
        consume(&mut store, exchange.id, text_fragments(chunks(parts)), "failed").await;

        let last = store.turns().last().unwrap();
        assert_eq!(last.role, TurnRole::Assistant);
        assert_eq!(last.content, answer);
        assert!(store.in_flight().is_none());
    }

    #[tokio::test]
    async fn test_consume_failure_leaves_no_partial_content() {
        let body = stream::iter(vec![
            Ok(b"partial answer".to_vec()),
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "eof")),
        ]);

        let mut store = MessageStore::with_greeting("hello");
        let exchange = store.submit("question").unwrap();
        consume(&mut store, exchange.id, text_fragments(body), "failed").await;

        assert!(store.in_flight().is_none());
        let assistant_turns: Vec<_> = store.turns().iter().skip(2).collect();
        assert_eq!(assistant_turns.len(), 1);
        assert_eq!(assistant_turns[0].content, "failed");
        assert!(store.turns().iter().all(|t| !t.content.contains("partial")));
    }
}
