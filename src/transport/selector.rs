//! Capability-checked transport factory.
//!
//! Consulted once per StreamSession; the chosen adapter serves that session
//! to the end even if configuration changes meanwhile.

use std::sync::Arc;

use log::{debug, warn};

use crate::TransportPreference;
use crate::transport::{ChunkedBodyTransport, EventStreamTransport, Transport, TransportKind};

pub struct TransportSelector {
    preference: TransportPreference,
    event_stream_supported: bool,
    event_stream: Arc<dyn Transport>,
    chunked: Arc<dyn Transport>,
}

impl TransportSelector {
    pub fn new(
        preference: TransportPreference,
        event_stream_supported: bool,
        event_stream: Arc<dyn Transport>,
        chunked: Arc<dyn Transport>,
    ) -> Self {
        Self {
            preference,
            event_stream_supported,
            event_stream,
            chunked,
        }
    }

    /// Both HTTP adapters against `base_url`, sharing one connection pool.
    pub fn http(
        base_url: &str,
        preference: TransportPreference,
        event_stream_supported: bool,
    ) -> Self {
        let client = reqwest::Client::new();
        Self::new(
            preference,
            event_stream_supported,
            Arc::new(EventStreamTransport::new(base_url, client.clone())),
            Arc::new(ChunkedBodyTransport::new(base_url, client)),
        )
    }

    pub fn preference(&self) -> TransportPreference {
        self.preference
    }

    pub fn set_preference(&mut self, preference: TransportPreference) {
        self.preference = preference;
    }

    pub fn select_kind(&self) -> TransportKind {
        match self.preference {
            TransportPreference::ChunkedBody => TransportKind::ChunkedBody,
            TransportPreference::Auto if self.event_stream_supported => TransportKind::EventStream,
            TransportPreference::Auto => TransportKind::ChunkedBody,
            TransportPreference::EventStream if self.event_stream_supported => {
                TransportKind::EventStream
            }
            TransportPreference::EventStream => TransportKind::ChunkedBody,
        }
    }

    pub fn select(&self) -> Arc<dyn Transport> {
        let kind = self.select_kind();
        if self.preference == TransportPreference::EventStream && !self.event_stream_supported {
            warn!("event-stream transport requested but unsupported, using chunked-body");
        }
        debug!("Selected {} transport", kind);
        match kind {
            TransportKind::EventStream => Arc::clone(&self.event_stream),
            TransportKind::ChunkedBody => Arc::clone(&self.chunked),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector(preference: TransportPreference, supported: bool) -> TransportSelector {
        TransportSelector::http("http://localhost:8000", preference, supported)
    }

    #[test]
    fn auto_prefers_event_stream_when_supported() {
        assert_eq!(
            selector(TransportPreference::Auto, true).select_kind(),
            TransportKind::EventStream
        );
        assert_eq!(
            selector(TransportPreference::Auto, false).select_kind(),
            TransportKind::ChunkedBody
        );
    }

    #[test]
    fn forced_chunked_body_ignores_capability() {
        assert_eq!(
            selector(TransportPreference::ChunkedBody, true).select_kind(),
            TransportKind::ChunkedBody
        );
    }

    #[test]
    fn forced_event_stream_falls_back_when_unsupported() {
        assert_eq!(
            selector(TransportPreference::EventStream, true).select_kind(),
            TransportKind::EventStream
        );
        assert_eq!(
            selector(TransportPreference::EventStream, false).select_kind(),
            TransportKind::ChunkedBody
        );
    }

    #[test]
    fn select_returns_adapter_of_selected_kind() {
        let mut sel = selector(TransportPreference::Auto, true);
        assert_eq!(sel.select().kind(), TransportKind::EventStream);
        sel.set_preference(TransportPreference::ChunkedBody);
        assert_eq!(sel.select().kind(), TransportKind::ChunkedBody);
    }
}
