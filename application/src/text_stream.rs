//! Turns the raw chat reply into decoded text chunks.

use domain::backend::ChunkStream;
use futures::stream::{self, BoxStream, StreamExt};
use shared::types::Result;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("agent reply stalled: no data for {0:?}")]
pub struct StreamStalled(pub Duration);

/// Incremental UTF-8 decoder. A code point split across two chunks is held
/// back until its remaining bytes arrive; invalid bytes become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    pending: Vec<u8>,
}

impl Utf8ChunkDecoder {
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    // from_utf8 already validated this prefix.
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match err.error_len() {
                        None => {
                            self.pending.drain(..valid);
                            return out;
                        }
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                    }
                }
            }
        }
    }

    /// Flushes whatever is left once the stream has ended.
    pub fn finish(self) -> String {
        String::from_utf8_lossy(&self.pending).into_owned()
    }
}

struct DecodeState {
    chunks: ChunkStream,
    decoder: Option<Utf8ChunkDecoder>,
    idle_timeout: Duration,
}

/// Decoded text of the reply, one item per non-empty piece. Each read waits
/// at most `idle_timeout`; a longer silence yields [`StreamStalled`] and ends
/// the stream.
pub fn text_chunks(chunks: ChunkStream, idle_timeout: Duration) -> BoxStream<'static, Result<String>> {
    let state = DecodeState {
        chunks,
        decoder: Some(Utf8ChunkDecoder::default()),
        idle_timeout,
    };
    stream::unfold(state, |mut state| async move {
        loop {
            let decoder = state.decoder.as_mut()?;
            match tokio::time::timeout(state.idle_timeout, state.chunks.next()).await {
                Err(_) => {
                    let stalled = StreamStalled(state.idle_timeout);
                    state.decoder = None;
                    return Some((Err(anyhow::Error::from(stalled)), state));
                }
                Ok(Some(Ok(bytes))) => {
                    let text = decoder.decode(&bytes);
                    if !text.is_empty() {
                        return Some((Ok(text), state));
                    }
                }
                Ok(Some(Err(err))) => {
                    state.decoder = None;
                    return Some((Err(err), state));
                }
                Ok(None) => {
                    let tail = state.decoder.take()?.finish();
                    if tail.is_empty() {
                        return None;
                    }
                    return Some((Ok(tail), state));
                }
            }
        }
    })
    .boxed()
}
