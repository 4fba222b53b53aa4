//! # Chat SSE Events
//!
//! Defines [`ChatEvent`] — the wire shape of everything pushed to the
//! client over the per-request Server-Sent Events stream.
//!
//! ## Event Lifecycle
//!
//! ```text
//! Delta* → Done
//!      or → Error
//! ```
//!
//! ## Serialization
//!
//! Uses `#[serde(tag = "type")]` to produce JSON with a discriminator:
//!
//! ```json
//! { "type": "Delta", "text": "📋 گزارش..." }
//! ```
//!
//! The frontend does `JSON.parse(e.data)` and appends `Delta` text,
//! closes on `Done`, and shows `Error` as an alert. Clients that
//! buffered `Delta` chunks before an `Error` keep what they received —
//! deterministic content already flushed is never retracted.

use serde::Serialize;

use crate::pipeline::PipelineEvent;

/// One event on the chat response stream.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum ChatEvent {
    /// A chunk of response text, in emission order.
    Delta { text: String },

    /// Normal end of stream. Always the last event on a successful turn.
    Done,

    /// Terminal failure. Carries a generic message, never internal detail.
    Error { message: String },
}

impl From<PipelineEvent> for ChatEvent {
    fn from(ev: PipelineEvent) -> Self {
        match ev {
            PipelineEvent::Delta(text) => ChatEvent::Delta { text },
            PipelineEvent::Error { message } => ChatEvent::Error { message },
        }
    }
}
