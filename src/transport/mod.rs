//! # Transport Adapters
//!
//! A transport turns one backend connection into a lazy, finite,
//! non-restartable sequence of [`TransportEvent`]s:
//!
//! ```text
//! Fragment* ( Completed | Failed(err) )?
//! ```
//!
//! The sequence ends *without* a terminal event only when the session's
//! [`CancellationToken`] fires. Nothing touches the network until the
//! stream is first polled, and every await inside it races the token.
//!
//! Two adapters implement [`Transport`]:
//!
//! - [`EventStreamTransport`]: `GET /api/chat/sse?prompt=…`, one fragment per
//!   `data:` event, `event: end`/`event: done` completes.
//! - [`ChunkedBodyTransport`]: `POST /api/chat/stream`, one fragment per body
//!   segment, end of body completes.
//!
//! [`TransportSelector`] picks between them once per session.

pub mod chunked;
pub mod decode;
pub mod event_stream;
pub mod selector;
pub mod sse;

use std::fmt;

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use chunked::ChunkedBodyTransport;
pub use event_stream::EventStreamTransport;
pub use selector::TransportSelector;

/// Path of the chunked-body endpoint, relative to the backend base URL.
pub const CHUNKED_BODY_PATH: &str = "/api/chat/stream";
/// Path of the event-stream endpoint, relative to the backend base URL.
pub const EVENT_STREAM_PATH: &str = "/api/chat/sse";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    EventStream,
    ChunkedBody,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::EventStream => f.write_str("event-stream"),
            TransportKind::ChunkedBody => f.write_str("chunked-body"),
        }
    }
}

/// Transport-level failures. Each one ends the sequence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connection(String),
    /// The connection dropped after the response started.
    #[error("stream interrupted: {0}")]
    Interrupted(String),
    /// Non-2xx status or an explicit error event from the backend.
    #[error("backend error{}: {message}", status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Backend { status: Option<u16>, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One unit of text, verbatim.
    Fragment(String),
    /// Completion marker.
    Completed,
    /// Error marker.
    Failed(TransportError),
}

impl TransportEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransportEvent::Fragment(_))
    }
}

pub type FragmentStream = BoxStream<'static, TransportEvent>;

/// One backend connection strategy.
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Returns the lazy event sequence for `prompt`. Cancelling `cancel`
    /// aborts the underlying request and ends the sequence with no
    /// terminal event.
    fn open(&self, prompt: &str, cancel: CancellationToken) -> FragmentStream;
}

/// Joins `path` onto `base_url`, tolerating a trailing slash on the base.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}
