//! Typed events for the chat response stream.
//!
//! The streaming endpoint answers with a line-oriented event stream where
//! each `data:` line carries a JSON object. This module turns raw body bytes
//! into a lazy sequence of [`StreamEvent`]s.
//!
//! # Event Types
//!
//! - [`StreamEvent::Content`]: incremental assistant text
//! - [`StreamEvent::Error`]: server-side failure, terminates the response
//! - [`StreamEvent::Done`]: terminal signal with the updated credit balance
//!
//! # Example
//!
//! ```rust
//! use coach_chat::stream::{SseDecoder, StreamEvent};
//!
//! let mut decoder = SseDecoder::new();
//! let mut events = decoder.feed(b"data: {\"content\":\"Hi\"}\n\ndata: {\"do");
//! events.extend(decoder.feed(b"ne\":true,\"remaining_credits\":42}\n\n"));
//!
//! assert_eq!(events[0], StreamEvent::Content("Hi".to_string()));
//! assert_eq!(
//!     events[1],
//!     StreamEvent::Done { remaining_credits: Some(42), credits_used: None }
//! );
//! ```

mod decoder;

pub use decoder::{MalformedLine, MalformedLineHook, SseDecoder, decode_stream};

use serde::Deserialize;

/// A decoded event from the chat response stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Text fragment to append to the assistant message.
    Content(String),
    /// Error reported by the server; no further content follows.
    Error(String),
    /// The response is complete.
    Done {
        /// Credit balance after this reply was charged.
        remaining_credits: Option<i64>,
        /// Credits charged for this reply.
        credits_used: Option<i64>,
    },
}

/// Wire shape of one `data:` payload.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawPayload {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub done: Option<bool>,
    #[serde(default)]
    pub remaining_credits: Option<i64>,
    #[serde(default)]
    pub credits_used: Option<i64>,
}

impl RawPayload {
    /// Expand the payload into events, in the order the controller must
    /// apply them. An error suppresses everything else in the payload.
    pub(crate) fn into_events(self) -> Vec<StreamEvent> {
        if let Some(error) = self.error {
            return vec![StreamEvent::Error(error)];
        }

        let mut events = Vec::with_capacity(2);
        if let Some(text) = self.content.filter(|t| !t.is_empty()) {
            events.push(StreamEvent::Content(text));
        }
        if self.done.unwrap_or(false) {
            events.push(StreamEvent::Done {
                remaining_credits: self.remaining_credits,
                credits_used: self.credits_used,
            });
        }
        events
    }
}
