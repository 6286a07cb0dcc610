//! Chunked-body transport.
//!
//! `POST {base}/api/chat/stream` with `{"prompt": …}`. The `text/plain`
//! response body is read segment by segment; every segment that decodes to
//! text becomes one fragment, verbatim. End of body is the completion
//! marker.

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::transport::decode::Utf8Decoder;
use crate::transport::{
    CHUNKED_BODY_PATH, FragmentStream, Transport, TransportError, TransportEvent, TransportKind,
    endpoint,
};

/// Request body for the chunked endpoint.
#[derive(Serialize, Debug)]
struct StreamRequest {
    prompt: String,
}

pub struct ChunkedBodyTransport {
    base_url: String,
    client: reqwest::Client,
}

impl ChunkedBodyTransport {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }
}

enum State {
    Connect {
        client: reqwest::Client,
        url: String,
        prompt: String,
    },
    Read {
        response: reqwest::Response,
        decoder: Utf8Decoder,
        fragments: usize,
    },
    /// Terminal event waiting to be yielded after a final fragment.
    Emit(TransportEvent),
    Done,
}

impl Transport for ChunkedBodyTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::ChunkedBody
    }

    fn open(&self, prompt: &str, cancel: CancellationToken) -> FragmentStream {
        let initial = State::Connect {
            client: self.client.clone(),
            url: endpoint(&self.base_url, CHUNKED_BODY_PATH),
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
                info!("Chunked-body request: POST {} (prompt_len={})", url, prompt.len());
                let send = client.post(&url).json(&StreamRequest { prompt }).send();
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("Chunked-body request cancelled before response");
                        return None;
                    }
                    result = send => result,
                };

                let response = match result {
                    Ok(response) => response,
                    Err(e) => {
                        warn!("Chunked-body connection failed: {}", e);
                        return Some((
                            TransportEvent::Failed(TransportError::Connection(e.to_string())),
                            State::Done,
                        ));
                    }
                };

                debug!("Chunked-body response status: {}", response.status());
                if !response.status().is_success() {
                    let status = response.status().as_u16();
                    let message = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return None,
                        body = response.text() => body.unwrap_or_else(|_| "unknown error".to_string()),
                    };
                    warn!("Chunked-body backend error: {} - {}", status, message);
                    return Some((
                        TransportEvent::Failed(TransportError::Backend {
                            status: Some(status),
                            message,
                        }),
                        State::Done,
                    ));
                }

                State::Read {
                    response,
                    decoder: Utf8Decoder::new(),
                    fragments: 0,
                }
            }

            State::Read {
                mut response,
                mut decoder,
                fragments,
            } => {
                let chunk = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        // Dropping the response aborts the request.
                        debug!("Chunked-body stream cancelled after {} fragments", fragments);
                        return None;
                    }
                    chunk = response.chunk() => chunk,
                };

                match chunk {
                    Ok(Some(bytes)) => {
                        debug!("Raw chunk received: {} bytes", bytes.len());
                        let text = decoder.decode(&bytes);
                        if text.is_empty() {
                            State::Read {
                                response,
                                decoder,
                                fragments,
                            }
                        } else {
                            return Some((
                                TransportEvent::Fragment(text),
                                State::Read {
                                    response,
                                    decoder,
                                    fragments: fragments + 1,
                                },
                            ));
                        }
                    }
                    Ok(None) => {
                        info!("Chunked-body stream complete: {} fragments", fragments);
                        let tail = decoder.finish();
                        if tail.is_empty() {
                            return Some((TransportEvent::Completed, State::Done));
                        }
                        return Some((
                            TransportEvent::Fragment(tail),
                            State::Emit(TransportEvent::Completed),
                        ));
                    }
                    Err(e) => {
                        warn!("Chunked-body stream interrupted: {}", e);
                        return Some((
                            TransportEvent::Failed(TransportError::Interrupted(e.to_string())),
                            State::Done,
                        ));
                    }
                }
            }

            State::Emit(event) => return Some((event, State::Done)),
            State::Done => return None,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_shape() {
        let json = serde_json::to_string(&StreamRequest {
            prompt: "hello".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"prompt":"hello"}"#);
    }

    #[tokio::test]
    async fn cancelled_before_poll_yields_nothing() {
        let transport = ChunkedBodyTransport::new("http://127.0.0.1:9", reqwest::Client::new());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let events: Vec<_> = transport.open("hello", cancel).collect().await;
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_connection_error() {
        // Port 9 (discard) on loopback is closed in test environments.
        let transport = ChunkedBodyTransport::new("http://127.0.0.1:9", reqwest::Client::new());
        let events: Vec<_> = transport.open("hello", CancellationToken::new()).collect().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            TransportEvent::Failed(TransportError::Connection(_))
        ));
    }
}
