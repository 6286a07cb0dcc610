//! Event-stream transport.
//!
//! `GET {base}/api/chat/sse?prompt=…` with `Accept: text/event-stream`.
//! Each message event is one fragment. `event: end` or `event: done`
//! completes; `event: error` fails with its data as the message; a body
//! that ends without either is an interrupted stream.

use std::collections::VecDeque;

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::transport::decode::Utf8Decoder;
use crate::transport::sse::{SseDecoder, SseEvent};
use crate::transport::{
    EVENT_STREAM_PATH, FragmentStream, Transport, TransportError, TransportEvent, TransportKind,
    endpoint,
};

/// Payload some backends send on an unnamed event instead of `event: end`.
const DONE_SENTINEL: &str = "[DONE]";

pub struct EventStreamTransport {
    base_url: String,
    client: reqwest::Client,
}

impl EventStreamTransport {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }
}

/// Maps one framed event to what the session should see, if anything.
fn classify(event: SseEvent) -> Option<TransportEvent> {
    match event.event.as_deref() {
        Some("end") | Some("done") => Some(TransportEvent::Completed),
        Some("error") => Some(TransportEvent::Failed(TransportError::Backend {
            status: None,
            message: event.data,
        })),
        None | Some("message") => {
            if event.data == DONE_SENTINEL {
                Some(TransportEvent::Completed)
            } else {
                Some(TransportEvent::Fragment(event.data))
            }
        }
        Some(other) => {
            debug!("Ignoring SSE event type '{}'", other);
            None
        }
    }
}

struct Reader {
    response: reqwest::Response,
    bytes: Utf8Decoder,
    frames: SseDecoder,
    pending: VecDeque<TransportEvent>,
    fragments: usize,
}

enum State {
    Connect {
        client: reqwest::Client,
        url: String,
        prompt: String,
    },
    Read(Box<Reader>),
    Done,
}

impl Transport for EventStreamTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::EventStream
    }

    fn open(&self, prompt: &str, cancel: CancellationToken) -> FragmentStream {
        let initial = State::Connect {
            client: self.client.clone(),
            url: endpoint(&self.base_url, EVENT_STREAM_PATH),
            prompt: prompt.to_string(),
        };

        stream::unfold(initial, move |state| {
            let cancel = cancel.clone();
            async move { next_event(state, cancel).await }
        })
        .boxed()
    }
}

async fn next_event(
    mut state: State,
    cancel: CancellationToken,
) -> Option<(TransportEvent, State)> {
    loop {
        state = match state {
            State::Connect {
                client,
                url,
                prompt,
            } => {
                info!("Event-stream request: GET {} (prompt_len={})", url, prompt.len());
                let send = client
                    .get(&url)
                    .query(&[("prompt", prompt.as_str())])
                    .header(reqwest::header::ACCEPT, "text/event-stream")
                    .send();
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("Event-stream request cancelled before response");
                        return None;
                    }
                    result = send => result,
                };

                let response = match result {
                    Ok(response) => response,
                    Err(e) => {
                        warn!("Event-stream connection failed: {}", e);
                        return Some((
                            TransportEvent::Failed(TransportError::Connection(e.to_string())),
                            State::Done,
                        ));
                    }
                };

                debug!("Event-stream response status: {}", response.status());
                if !response.status().is_success() {
                    let status = response.status().as_u16();
                    let message = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return None,
                        body = response.text() => body.unwrap_or_else(|_| "unknown error".to_string()),
                    };
                    warn!("Event-stream backend error: {} - {}", status, message);
                    return Some((
                        TransportEvent::Failed(TransportError::Backend {
                            status: Some(status),
                            message,
                        }),
                        State::Done,
                    ));
                }

                State::Read(Box::new(Reader {
                    response,
                    bytes: Utf8Decoder::new(),
                    frames: SseDecoder::new(),
                    pending: VecDeque::new(),
                    fragments: 0,
                }))
            }

            State::Read(mut reader) => {
                // Events already framed are dropped with the connection.
                if cancel.is_cancelled() {
                    debug!(
                        "Event-stream cancelled after {} fragments, dropping {} framed events",
                        reader.fragments,
                        reader.pending.len()
                    );
                    return None;
                }

                if let Some(event) = reader.pending.pop_front() {
                    if event.is_terminal() {
                        info!(
                            "Event-stream finished after {} fragments: {:?}",
                            reader.fragments, event
                        );
                        // Dropping the reader closes the connection.
                        return Some((event, State::Done));
                    }
                    reader.fragments += 1;
                    return Some((event, State::Read(reader)));
                }

                let chunk = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!(
                            "Event-stream cancelled after {} fragments, closing connection",
                            reader.fragments
                        );
                        return None;
                    }
                    chunk = reader.response.chunk() => chunk,
                };

                match chunk {
                    Ok(Some(bytes)) => {
                        let text = reader.bytes.decode(&bytes);
                        for frame in reader.frames.feed(&text) {
                            debug!("SSE event: {:?} ({} bytes)", frame.event, frame.data.len());
                            if let Some(event) = classify(frame) {
                                reader.pending.push_back(event);
                            }
                        }
                        State::Read(reader)
                    }
                    Ok(None) => {
                        // An undispatched trailing event is discarded with the body.
                        warn!(
                            "Event-stream ended without a terminal event after {} fragments (partial={})",
                            reader.fragments,
                            reader.frames.has_partial() || reader.bytes.has_pending()
                        );
                        return Some((
                            TransportEvent::Failed(TransportError::Interrupted(
                                "event stream closed before completion".to_string(),
                            )),
                            State::Done,
                        ));
                    }
                    Err(e) => {
                        warn!("Event-stream interrupted: {}", e);
                        return Some((
                            TransportEvent::Failed(TransportError::Interrupted(e.to_string())),
                            State::Done,
                        ));
                    }
                }
            }

            State::Done => return None,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(event: Option<&str>, data: &str) -> SseEvent {
        SseEvent {
            event: event.map(str::to_string),
            data: data.to_string(),
            id: None,
        }
    }

    #[test]
    fn unnamed_events_are_fragments_verbatim() {
        assert_eq!(
            classify(frame(None, " there")),
            Some(TransportEvent::Fragment(" there".into()))
        );
        assert_eq!(
            classify(frame(Some("message"), "x")),
            Some(TransportEvent::Fragment("x".into()))
        );
    }

    #[test]
    fn end_and_done_complete() {
        assert_eq!(classify(frame(Some("end"), "")), Some(TransportEvent::Completed));
        assert_eq!(classify(frame(Some("done"), "[END]")), Some(TransportEvent::Completed));
        assert_eq!(classify(frame(None, "[DONE]")), Some(TransportEvent::Completed));
    }

    #[test]
    fn error_event_carries_data_as_message() {
        assert_eq!(
            classify(frame(Some("error"), "model overloaded")),
            Some(TransportEvent::Failed(TransportError::Backend {
                status: None,
                message: "model overloaded".into(),
            }))
        );
    }

    #[test]
    fn other_event_types_ignored() {
        assert_eq!(classify(frame(Some("ping"), "")), None);
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_connection_error() {
        let transport = EventStreamTransport::new("http://127.0.0.1:9", reqwest::Client::new());
        let events: Vec<_> = transport.open("hello", CancellationToken::new()).collect().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            TransportEvent::Failed(TransportError::Connection(_))
        ));
    }
}
