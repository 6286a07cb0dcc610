//! # Stream Controller
//!
//! Owns the conversation and at most one live StreamSession. All mutation
//! of assistant messages goes through here, synchronously, in the order
//! updates are applied.
//!
//! ```text
//! send/regenerate/retry ──▶ SessionTicket { epoch, prompt, cancel }
//!                                   │ (caller opens the transport)
//!                                   ▼
//!        SessionUpdate { epoch, event } ──apply──▶ Message
//! ```
//!
//! Every session gets a fresh [`Epoch`]. Updates carrying any other epoch
//! are dropped, so nothing from a stopped or superseded session can touch
//! state once `stop` returns.

use std::fmt;

use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::core::accumulator::Accumulator;
use crate::core::conversation::Conversation;
use crate::core::error::{ChatError, ErrorDescriptor};
use crate::core::lifecycle::{MessageState, Transition};
use crate::core::message::{MessageId, Role};
use crate::transport::{TransportEvent, TransportKind};

/// Monotonic session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Epoch(u64);

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What the caller needs to drive a newly opened session.
#[derive(Debug, Clone)]
pub struct SessionTicket {
    pub epoch: Epoch,
    pub message_id: MessageId,
    pub prompt: String,
    pub cancel: CancellationToken,
    pub transport: TransportKind,
}

/// One transport event tagged with the session it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUpdate {
    pub epoch: Epoch,
    pub event: TransportEvent,
}

/// Result of applying an update that was not discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageUpdate {
    pub message_id: MessageId,
    pub state: MessageState,
    /// True when this update ended the session.
    pub session_ended: bool,
}

#[derive(Debug)]
struct ActiveSession {
    epoch: Epoch,
    message_id: MessageId,
    transport: TransportKind,
    cancel: CancellationToken,
    accumulator: Accumulator,
}

#[derive(Debug, Default)]
pub struct StreamController {
    conversation: Conversation,
    session: Option<ActiveSession>,
    last_epoch: u64,
}

impl StreamController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_conversation(conversation: Conversation) -> Self {
        Self {
            conversation,
            ..Self::default()
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn is_busy(&self) -> bool {
        self.session.is_some()
    }

    /// Epoch and message of the live session, if any.
    pub fn active_session(&self) -> Option<(Epoch, MessageId)> {
        self.session.as_ref().map(|s| (s.epoch, s.message_id))
    }

    /// Appends the prompt and its assistant reply, and opens a session for
    /// the reply. The ticket's `message_id` is the assistant message.
    pub fn send(
        &mut self,
        prompt: impl Into<String>,
        transport: TransportKind,
    ) -> Result<SessionTicket, ChatError> {
        if self.session.is_some() {
            return Err(ChatError::Busy);
        }

        let prompt = prompt.into();
        let (_, assistant_id) = self.conversation.push_turn(prompt.clone());
        let message = self
            .conversation
            .get_mut(assistant_id)
            .ok_or(ChatError::UnknownMessage(assistant_id))?;
        message.state = transition(message.state, Transition::Send)?;

        Ok(self.open_session(assistant_id, prompt, transport))
    }

    /// Archives the current content as a version and streams a fresh reply
    /// to the same prompt.
    pub fn regenerate(
        &mut self,
        message_id: MessageId,
        transport: TransportKind,
    ) -> Result<SessionTicket, ChatError> {
        self.restart(message_id, Transition::Regenerate, transport)
    }

    /// Like [`regenerate`](Self::regenerate) from `error` only, dropping
    /// the failed content instead of versioning it.
    pub fn retry(
        &mut self,
        message_id: MessageId,
        transport: TransportKind,
    ) -> Result<SessionTicket, ChatError> {
        self.restart(message_id, Transition::Retry, transport)
    }

    /// Cancels the live session if it belongs to `message_id`. Partial text
    /// stays. Returns whether anything was stopped.
    pub fn stop(&mut self, message_id: MessageId) -> bool {
        let Some(session) = self.session.take_if(|s| s.message_id == message_id) else {
            debug!("stop({}) with no matching live session", message_id);
            return false;
        };

        session.cancel.cancel();
        if let Some(message) = self.conversation.get_mut(message_id) {
            if let Some(next) = message.state.next(Transition::Stop) {
                message.state = next;
            }
            message.content.refresh_code_blocks();
        }
        info!(
            "Session {} stopped after {} fragments",
            session.epoch,
            session.accumulator.fragment_count()
        );
        true
    }

    /// Applies one update. Returns `None` if it was stale and discarded.
    pub fn apply(&mut self, update: SessionUpdate) -> Option<MessageUpdate> {
        let Some(session) = self.session.as_mut() else {
            warn!("Discarding update from session {}: no live session", update.epoch);
            return None;
        };
        if session.epoch != update.epoch {
            warn!(
                "Discarding update from session {}: live session is {}",
                update.epoch, session.epoch
            );
            return None;
        }

        let message_id = session.message_id;
        let Some(message) = self.conversation.get_mut(message_id) else {
            warn!("Session {} lost its message {}", session.epoch, message_id);
            self.session = None;
            return None;
        };

        let (state, ended) = match update.event {
            TransportEvent::Fragment(fragment) => {
                if session.accumulator.is_untouched() {
                    if let Some(next) = message.state.next(Transition::FirstFragment) {
                        message.state = next;
                    }
                }
                let text = session.accumulator.push(&fragment);
                message.content.text.clear();
                message.content.text.push_str(text);
                debug!(
                    "Session {} fragment {} ({} bytes)",
                    session.epoch,
                    session.accumulator.fragment_count(),
                    fragment.len()
                );
                (message.state, false)
            }
            TransportEvent::Completed => {
                message.state = message
                    .state
                    .next(Transition::CompletionMarker)
                    .unwrap_or(MessageState::Completed);
                message.content.refresh_code_blocks();
                info!(
                    "Session {} completed via {} ({} fragments)",
                    session.epoch,
                    session.transport,
                    session.accumulator.fragment_count()
                );
                (message.state, true)
            }
            TransportEvent::Failed(err) => {
                message.state = message
                    .state
                    .next(Transition::TransportFailure)
                    .unwrap_or(MessageState::Error);
                message.error = Some(ErrorDescriptor::from(&err));
                message.content.refresh_code_blocks();
                warn!("Session {} failed via {}: {}", session.epoch, session.transport, err);
                (message.state, true)
            }
        };

        if ended {
            self.session = None;
        }
        Some(MessageUpdate {
            message_id,
            state,
            session_ended: ended,
        })
    }

    fn restart(
        &mut self,
        message_id: MessageId,
        via: Transition,
        transport: TransportKind,
    ) -> Result<SessionTicket, ChatError> {
        if self.session.is_some() {
            return Err(ChatError::Busy);
        }

        let message = self
            .conversation
            .get(message_id)
            .ok_or(ChatError::UnknownMessage(message_id))?;
        if message.role != Role::Assistant {
            return Err(ChatError::InvalidTransition {
                action: via.action(),
                state: message.state,
            });
        }
        let next = transition(message.state, via)?;
        let prompt = self
            .conversation
            .prompt_for(message_id)
            .ok_or(ChatError::UnknownMessage(message_id))?
            .to_string();

        let message = self
            .conversation
            .get_mut(message_id)
            .ok_or(ChatError::UnknownMessage(message_id))?;
        match via {
            Transition::Regenerate => message.archive_content(),
            _ => message.discard_content(),
        }
        message.error = None;
        message.state = next;

        Ok(self.open_session(message_id, prompt, transport))
    }

    fn open_session(
        &mut self,
        message_id: MessageId,
        prompt: String,
        transport: TransportKind,
    ) -> SessionTicket {
        self.last_epoch += 1;
        let epoch = Epoch(self.last_epoch);
        let cancel = CancellationToken::new();
        info!("Session {} opened for {} via {}", epoch, message_id, transport);

        self.session = Some(ActiveSession {
            epoch,
            message_id,
            transport,
            cancel: cancel.clone(),
            accumulator: Accumulator::new(),
        });

        SessionTicket {
            epoch,
            message_id,
            prompt,
            cancel,
            transport,
        }
    }
}

fn transition(state: MessageState, via: Transition) -> Result<MessageState, ChatError> {
    state.next(via).ok_or(ChatError::InvalidTransition {
        action: via.action(),
        state,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorCode;
    use crate::transport::TransportError;

    const KIND: TransportKind = TransportKind::ChunkedBody;

    fn fragment(epoch: Epoch, text: &str) -> SessionUpdate {
        SessionUpdate {
            epoch,
            event: TransportEvent::Fragment(text.to_string()),
        }
    }

    fn completed(epoch: Epoch) -> SessionUpdate {
        SessionUpdate {
            epoch,
            event: TransportEvent::Completed,
        }
    }

    fn failed(epoch: Epoch, err: TransportError) -> SessionUpdate {
        SessionUpdate {
            epoch,
            event: TransportEvent::Failed(err),
        }
    }

    fn state_of(ctl: &StreamController, id: MessageId) -> MessageState {
        ctl.conversation().get(id).unwrap().state
    }

    fn text_of(ctl: &StreamController, id: MessageId) -> &str {
        ctl.conversation().get(id).unwrap().text()
    }

    #[test]
    fn send_creates_completed_user_and_requesting_assistant() {
        let mut ctl = StreamController::new();
        let ticket = ctl.send("hello", KIND).unwrap();

        let messages = ctl.conversation().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].state, MessageState::Completed);
        assert_eq!(messages[1].id, ticket.message_id);
        assert_eq!(messages[1].state, MessageState::Requesting);
        assert_eq!(ticket.prompt, "hello");
        assert_eq!(ctl.active_session(), Some((ticket.epoch, ticket.message_id)));
    }

    #[test]
    fn fragments_accumulate_then_complete() {
        let mut ctl = StreamController::new();
        let t = ctl.send("hello", KIND).unwrap();

        let first = ctl.apply(fragment(t.epoch, "Hi")).unwrap();
        assert_eq!(first.state, MessageState::Streaming);
        ctl.apply(fragment(t.epoch, " there"));
        ctl.apply(fragment(t.epoch, "!"));
        let done = ctl.apply(completed(t.epoch)).unwrap();

        assert!(done.session_ended);
        assert_eq!(state_of(&ctl, t.message_id), MessageState::Completed);
        assert_eq!(text_of(&ctl, t.message_id), "Hi there!");
        assert!(!ctl.is_busy());
    }

    #[test]
    fn whitespace_fragments_survive_accumulation() {
        let mut ctl = StreamController::new();
        let t = ctl.send("hello", KIND).unwrap();
        for piece in ["a", " ", "\n\n", "b "] {
            ctl.apply(fragment(t.epoch, piece));
        }
        ctl.apply(completed(t.epoch));
        assert_eq!(text_of(&ctl, t.message_id), "a \n\nb ");
    }

    #[test]
    fn send_while_busy_is_rejected_without_mutation() {
        let mut ctl = StreamController::new();
        let t = ctl.send("one", KIND).unwrap();
        ctl.apply(fragment(t.epoch, "partial"));
        let before = ctl.conversation().clone();

        assert_eq!(ctl.send("two", KIND).unwrap_err(), ChatError::Busy);
        assert_eq!(ctl.conversation().messages(), before.messages());
        assert_eq!(ctl.active_session().map(|s| s.0), Some(t.epoch));
    }

    #[test]
    fn stop_freezes_text_and_ignores_late_fragments() {
        let mut ctl = StreamController::new();
        let t = ctl.send("hello", KIND).unwrap();
        ctl.apply(fragment(t.epoch, "Hi"));

        assert!(ctl.stop(t.message_id));
        assert!(t.cancel.is_cancelled());
        assert_eq!(state_of(&ctl, t.message_id), MessageState::Stopped);

        assert!(ctl.apply(fragment(t.epoch, " there")).is_none());
        assert!(ctl.apply(completed(t.epoch)).is_none());
        assert_eq!(text_of(&ctl, t.message_id), "Hi");
        assert_eq!(state_of(&ctl, t.message_id), MessageState::Stopped);
    }

    #[test]
    fn stop_without_session_is_a_noop() {
        let mut ctl = StreamController::new();
        let t = ctl.send("hello", KIND).unwrap();
        ctl.apply(completed(t.epoch));

        assert!(!ctl.stop(t.message_id));
        assert_eq!(state_of(&ctl, t.message_id), MessageState::Completed);
        assert!(!ctl.stop(MessageId::new()));
    }

    #[test]
    fn stop_twice_is_idempotent() {
        let mut ctl = StreamController::new();
        let t = ctl.send("hello", KIND).unwrap();
        assert!(ctl.stop(t.message_id));
        assert!(!ctl.stop(t.message_id));
        assert_eq!(state_of(&ctl, t.message_id), MessageState::Stopped);
    }

    #[test]
    fn stop_before_first_fragment_leaves_empty_text() {
        let mut ctl = StreamController::new();
        let t = ctl.send("hello", KIND).unwrap();
        assert!(ctl.stop(t.message_id));
        assert_eq!(state_of(&ctl, t.message_id), MessageState::Stopped);
        assert_eq!(text_of(&ctl, t.message_id), "");
    }

    #[test]
    fn stop_then_regenerate_uses_a_new_epoch() {
        let mut ctl = StreamController::new();
        let first = ctl.send("hello", KIND).unwrap();
        ctl.apply(fragment(first.epoch, "Hi"));
        ctl.stop(first.message_id);

        let second = ctl.regenerate(first.message_id, KIND).unwrap();
        assert_ne!(second.epoch, first.epoch);
        assert!(second.epoch > first.epoch);
        assert_eq!(second.message_id, first.message_id);
        assert_eq!(second.prompt, "hello");
        assert_eq!(state_of(&ctl, first.message_id), MessageState::Requesting);

        // The old session's stragglers cannot reach the new one.
        assert!(ctl.apply(fragment(first.epoch, "stale")).is_none());
        ctl.apply(fragment(second.epoch, "Hello"));
        assert_eq!(text_of(&ctl, first.message_id), "Hello");
    }

    #[test]
    fn regenerate_archives_previous_content() {
        let mut ctl = StreamController::new();
        let t = ctl.send("hello", KIND).unwrap();
        ctl.apply(fragment(t.epoch, "```rust\nfn a() {}\n```"));
        ctl.apply(completed(t.epoch));
        assert_eq!(ctl.conversation().get(t.message_id).unwrap().content.code_blocks.len(), 1);

        ctl.regenerate(t.message_id, KIND).unwrap();
        let msg = ctl.conversation().get(t.message_id).unwrap();
        assert!(msg.text().is_empty());
        assert!(msg.content.code_blocks.is_empty());
        assert_eq!(msg.versions.len(), 1);
        assert_eq!(msg.versions[0].state, MessageState::Completed);
        assert_eq!(msg.versions[0].content.code_blocks[0].language.as_deref(), Some("rust"));
    }

    #[test]
    fn transport_failure_records_descriptor() {
        let mut ctl = StreamController::new();
        let t = ctl.send("hello", KIND).unwrap();
        ctl.apply(fragment(t.epoch, "Hi"));
        let update = ctl
            .apply(failed(t.epoch, TransportError::Interrupted("reset".into())))
            .unwrap();

        assert_eq!(update.state, MessageState::Error);
        let msg = ctl.conversation().get(t.message_id).unwrap();
        assert_eq!(msg.error.as_ref().unwrap().code, ErrorCode::StreamInterrupted);
        assert_eq!(msg.text(), "Hi");
        assert!(!ctl.is_busy());
    }

    #[test]
    fn failure_before_first_fragment() {
        let mut ctl = StreamController::new();
        let t = ctl.send("hello", KIND).unwrap();
        ctl.apply(failed(t.epoch, TransportError::Connection("refused".into())));
        let msg = ctl.conversation().get(t.message_id).unwrap();
        assert_eq!(msg.state, MessageState::Error);
        assert_eq!(msg.error.as_ref().unwrap().code, ErrorCode::ConnectionError);
    }

    #[test]
    fn retry_discards_failed_content() {
        let mut ctl = StreamController::new();
        let t = ctl.send("hello", KIND).unwrap();
        ctl.apply(fragment(t.epoch, "Hi"));
        ctl.apply(failed(
            t.epoch,
            TransportError::Backend {
                status: Some(500),
                message: "boom".into(),
            },
        ));

        let again = ctl.retry(t.message_id, KIND).unwrap();
        let msg = ctl.conversation().get(t.message_id).unwrap();
        assert_eq!(msg.state, MessageState::Requesting);
        assert!(msg.text().is_empty());
        assert!(msg.error.is_none());
        assert!(msg.versions.is_empty());
        assert!(again.epoch > t.epoch);
    }

    #[test]
    fn retry_only_from_error() {
        let mut ctl = StreamController::new();
        let t = ctl.send("hello", KIND).unwrap();
        ctl.apply(completed(t.epoch));

        let err = ctl.retry(t.message_id, KIND).unwrap_err();
        assert_eq!(
            err,
            ChatError::InvalidTransition {
                action: "retry",
                state: MessageState::Completed,
            }
        );
        assert_eq!(state_of(&ctl, t.message_id), MessageState::Completed);
    }

    #[test]
    fn regenerate_while_streaming_is_busy() {
        let mut ctl = StreamController::new();
        let t = ctl.send("hello", KIND).unwrap();
        ctl.apply(fragment(t.epoch, "Hi"));
        assert_eq!(ctl.regenerate(t.message_id, KIND).unwrap_err(), ChatError::Busy);
        assert_eq!(text_of(&ctl, t.message_id), "Hi");
    }

    #[test]
    fn regenerate_user_message_is_invalid() {
        let mut ctl = StreamController::new();
        let t = ctl.send("hello", KIND).unwrap();
        ctl.apply(completed(t.epoch));
        let user_id = ctl.conversation().messages()[0].id;

        assert!(matches!(
            ctl.regenerate(user_id, KIND),
            Err(ChatError::InvalidTransition { action: "regenerate", .. })
        ));
    }

    #[test]
    fn unknown_message_is_rejected() {
        let mut ctl = StreamController::new();
        let id = MessageId::new();
        assert_eq!(ctl.regenerate(id, KIND).unwrap_err(), ChatError::UnknownMessage(id));
    }

    #[test]
    fn empty_response_completes_from_requesting() {
        let mut ctl = StreamController::new();
        let t = ctl.send("hello", KIND).unwrap();
        ctl.apply(completed(t.epoch));
        assert_eq!(state_of(&ctl, t.message_id), MessageState::Completed);
        assert_eq!(text_of(&ctl, t.message_id), "");
    }

    #[test]
    fn updates_with_no_session_are_discarded() {
        let mut ctl = StreamController::new();
        assert!(ctl.apply(fragment(Epoch(1), "ghost")).is_none());
        assert!(ctl.conversation().is_empty());
    }

    #[test]
    fn epochs_increase_across_sends() {
        let mut ctl = StreamController::new();
        let a = ctl.send("one", KIND).unwrap();
        ctl.apply(completed(a.epoch));
        let b = ctl.send("two", KIND).unwrap();
        assert!(b.epoch > a.epoch);
        assert_eq!(b.transport, KIND);
    }
}
