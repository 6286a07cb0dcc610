//! # Chat runtime
//!
//! Wires the [`StreamController`] to real transports. Each session runs in
//! its own tokio task that drains the adapter's stream and forwards
//! epoch-tagged events over an unbounded channel; the owner applies them
//! in arrival order with [`Chat::next_update`] or [`Chat::drain_updates`].
//!
//! ```text
//! Chat::send ──▶ controller.send ──▶ SessionTicket
//!                                       │
//!                tokio::spawn ◀─────────┘
//!                  transport.open(prompt, cancel)
//!                  └─▶ tx.send(SessionUpdate { epoch, event })
//!
//! Chat::next_update ◀── rx ──▶ controller.apply ──▶ MessageUpdate
//! ```

use std::sync::Arc;

use futures::StreamExt;
use log::{debug, info, warn};
use tokio::sync::mpsc;

use crate::core::controller::{MessageUpdate, SessionTicket, SessionUpdate, StreamController};
use crate::core::conversation::Conversation;
use crate::core::error::ChatError;
use crate::core::lifecycle::MessageState;
use crate::core::message::{Message, MessageId, MessageView};
use crate::transport::{Transport, TransportSelector};

pub struct Chat {
    controller: StreamController,
    selector: TransportSelector,
    tx: mpsc::UnboundedSender<SessionUpdate>,
    rx: mpsc::UnboundedReceiver<SessionUpdate>,
}

impl Chat {
    pub fn new(selector: TransportSelector) -> Self {
        Self::with_conversation(selector, Conversation::new())
    }

    pub fn with_conversation(selector: TransportSelector, conversation: Conversation) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            controller: StreamController::with_conversation(conversation),
            selector,
            tx,
            rx,
        }
    }

    pub fn messages(&self) -> &[Message] {
        self.controller.conversation().messages()
    }

    pub fn conversation(&self) -> &Conversation {
        self.controller.conversation()
    }

    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.controller.conversation().get(id)
    }

    pub fn view(&self, id: MessageId) -> Option<MessageView<'_>> {
        self.message(id).map(Message::view)
    }

    pub fn is_busy(&self) -> bool {
        self.controller.is_busy()
    }

    /// Assistant message owning the live session, if any.
    pub fn streaming_message(&self) -> Option<MessageId> {
        self.controller.active_session().map(|(_, id)| id)
    }

    pub fn selector(&self) -> &TransportSelector {
        &self.selector
    }

    pub fn selector_mut(&mut self) -> &mut TransportSelector {
        &mut self.selector
    }

    /// Submits `prompt`. Returns the assistant message id.
    pub fn send(&mut self, prompt: impl Into<String>) -> Result<MessageId, ChatError> {
        let transport = self.selector.select();
        let ticket = self.controller.send(prompt, transport.kind())?;
        Ok(self.spawn_session(transport, ticket))
    }

    pub fn regenerate(&mut self, id: MessageId) -> Result<MessageId, ChatError> {
        let transport = self.selector.select();
        let ticket = self.controller.regenerate(id, transport.kind())?;
        Ok(self.spawn_session(transport, ticket))
    }

    pub fn retry(&mut self, id: MessageId) -> Result<MessageId, ChatError> {
        let transport = self.selector.select();
        let ticket = self.controller.retry(id, transport.kind())?;
        Ok(self.spawn_session(transport, ticket))
    }

    /// Stops the live session for `id`. No-op without one.
    pub fn stop(&mut self, id: MessageId) -> bool {
        self.controller.stop(id)
    }

    /// Waits for the next update that is not stale.
    pub async fn next_update(&mut self) -> Option<MessageUpdate> {
        loop {
            let update = self.rx.recv().await?;
            if let Some(applied) = self.controller.apply(update) {
                return Some(applied);
            }
        }
    }

    /// Applies everything already queued without waiting.
    pub fn drain_updates(&mut self) -> Vec<MessageUpdate> {
        let mut applied = Vec::new();
        while let Ok(update) = self.rx.try_recv() {
            if let Some(result) = self.controller.apply(update) {
                applied.push(result);
            }
        }
        applied
    }

    /// Drives updates until `id` has no live session; returns its state.
    pub async fn wait_settled(&mut self, id: MessageId) -> Option<MessageState> {
        while self.streaming_message() == Some(id) {
            if self.next_update().await.is_none() {
                break;
            }
        }
        self.message(id).map(|m| m.state)
    }

    fn spawn_session(&self, transport: Arc<dyn Transport>, ticket: SessionTicket) -> MessageId {
        let SessionTicket {
            epoch,
            message_id,
            prompt,
            cancel,
            transport: kind,
        } = ticket;
        let tx = self.tx.clone();
        let mut events = transport.open(&prompt, cancel);

        tokio::spawn(async move {
            debug!("Session {} task started ({})", epoch, kind);
            let mut forwarded = 0usize;
            while let Some(event) = events.next().await {
                let terminal = event.is_terminal();
                forwarded += 1;
                if tx.send(SessionUpdate { epoch, event }).is_err() {
                    warn!("Session {}: receiver dropped", epoch);
                    return;
                }
                if terminal {
                    break;
                }
            }
            info!("Session {} task finished after {} events", epoch, forwarded);
        });

        message_id
    }
}
