//! Line-oriented SSE decoding.

use std::sync::Arc;

use futures::{Stream, StreamExt};

use crate::error::{Error, Result};

use super::{RawPayload, StreamEvent};

/// A `data:` line that could not be decoded.
#[derive(Debug, Clone)]
pub struct MalformedLine {
    /// The payload after the `data:` prefix.
    pub payload: String,
    /// Why decoding failed.
    pub reason: String,
}

/// Callback invoked for every skipped line.
pub type MalformedLineHook = Arc<dyn Fn(&MalformedLine) + Send + Sync>;

/// Per-connection decoder state.
///
/// Bytes are buffered until a full line is available, so frames and UTF-8
/// sequences split across network chunks decode correctly. Lines that are
/// not valid JSON are skipped; a corrupt chunk never ends the stream.
#[derive(Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    skipped: usize,
    on_malformed: Option<MalformedLineHook>,
}

impl std::fmt::Debug for SseDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SseDecoder")
            .field("buffered", &self.buf.len())
            .field("skipped", &self.skipped)
            .field("has_hook", &self.on_malformed.is_some())
            .finish()
    }
}

impl SseDecoder {
    /// Create a decoder with no diagnostic hook.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a hook that observes skipped lines.
    #[must_use]
    pub fn with_hook(mut self, hook: MalformedLineHook) -> Self {
        self.on_malformed = Some(hook);
        self
    }

    /// Number of lines skipped so far on this connection.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Feed a chunk of body bytes, returning every event completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buf.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line = self.buf.drain(..=pos).collect::<Vec<_>>();
            self.decode_line(&line[..line.len() - 1], &mut events);
        }
        events
    }

    /// Flush a final line that arrived without a trailing newline.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if !self.buf.is_empty() {
            let line = std::mem::take(&mut self.buf);
            self.decode_line(&line, &mut events);
        }
        events
    }

    /// Drop buffered bytes and counters for a new connection. The hook is kept.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.skipped = 0;
    }

    fn decode_line(&mut self, line: &[u8], out: &mut Vec<StreamEvent>) {
        let line = String::from_utf8_lossy(line);
        let line = line.trim_end_matches('\r');

        // Blank separators, comments and non-data fields carry nothing for us.
        let Some(data) = line.strip_prefix("data:") else {
            return;
        };
        let data = data.trim();
        if data.is_empty() {
            return;
        }

        match serde_json::from_str::<RawPayload>(data) {
            Ok(payload) => out.extend(payload.into_events()),
            Err(e) => self.skip(data, &e.to_string()),
        }
    }

    fn skip(&mut self, payload: &str, reason: &str) {
        self.skipped += 1;
        tracing::debug!(
            name: "stream.line.malformed",
            payload = %payload,
            reason = %reason,
            "Skipping malformed stream line"
        );
        if let Some(hook) = &self.on_malformed {
            hook(&MalformedLine {
                payload: payload.to_string(),
                reason: reason.to_string(),
            });
        }
    }
}

/// Decode a response body into a lazy stream of events.
///
/// Transport errors are passed through; the stream ends when the body does.
pub fn decode_stream<S, B, E>(
    body: S,
    mut decoder: SseDecoder,
) -> impl Stream<Item = Result<StreamEvent>> + Send
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Into<Error> + Send,
{
    async_stream::try_stream! {
        decoder.reset();
        futures::pin_mut!(body);
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(Into::<Error>::into)?;
            for event in decoder.feed(chunk.as_ref()) {
                yield event;
            }
        }
        for event in decoder.finish() {
            yield event;
        }
    }
}
