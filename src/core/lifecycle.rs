//! # Message Lifecycle
//!
//! Per-message state machine. The controller and user actions feed it
//! [`Transition`]s; anything not in the table below is rejected.
//!
//! ```text
//! idle       ──send──────────────▶ requesting
//! requesting ──first fragment────▶ streaming
//! requesting ──completion────────▶ completed   (empty response)
//! requesting ──stop──────────────▶ stopped
//! requesting ──failure───────────▶ error
//! streaming  ──completion────────▶ completed
//! streaming  ──stop──────────────▶ stopped
//! streaming  ──failure───────────▶ error
//! completed  ──regenerate────────▶ requesting
//! stopped    ──regenerate────────▶ requesting
//! error      ──retry|regenerate──▶ requesting
//! ```
//!
//! Only `requesting` and `streaming` own a live StreamSession.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageState {
    Idle,
    Requesting,
    Streaming,
    Completed,
    Stopped,
    Error,
}

/// Everything that can move a message from one state to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Send,
    FirstFragment,
    CompletionMarker,
    Stop,
    TransportFailure,
    Regenerate,
    Retry,
}

impl Transition {
    /// Verb used in rejection messages ("cannot retry a message that is ...").
    pub fn action(self) -> &'static str {
        match self {
            Transition::Send => "send",
            Transition::FirstFragment => "stream",
            Transition::CompletionMarker => "complete",
            Transition::Stop => "stop",
            Transition::TransportFailure => "fail",
            Transition::Regenerate => "regenerate",
            Transition::Retry => "retry",
        }
    }
}

impl MessageState {
    /// Applies `transition`, returning the next state or `None` if the
    /// table has no such edge.
    pub fn next(self, transition: Transition) -> Option<MessageState> {
        use MessageState::*;
        use Transition::*;

        match (self, transition) {
            (Idle, Send) => Some(Requesting),
            (Requesting, FirstFragment) => Some(Streaming),
            (Requesting | Streaming, CompletionMarker) => Some(Completed),
            (Requesting | Streaming, Stop) => Some(Stopped),
            (Requesting | Streaming, TransportFailure) => Some(Error),
            (Completed | Stopped | Error, Regenerate) => Some(Requesting),
            (Error, Retry) => Some(Requesting),
            _ => None,
        }
    }

    /// True for the two states that own a StreamSession.
    pub fn has_live_session(self) -> bool {
        matches!(self, MessageState::Requesting | MessageState::Streaming)
    }

    /// Terminal for the turn: nothing will happen until a user acts.
    pub fn is_settled(self) -> bool {
        !self.has_live_session()
    }

    pub fn label(self) -> &'static str {
        match self {
            MessageState::Idle => "idle",
            MessageState::Requesting => "requesting",
            MessageState::Streaming => "streaming",
            MessageState::Completed => "completed",
            MessageState::Stopped => "stopped",
            MessageState::Error => "error",
        }
    }
}

impl fmt::Display for MessageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use MessageState::*;
    use Transition::*;

    const ALL_STATES: [MessageState; 6] = [Idle, Requesting, Streaming, Completed, Stopped, Error];
    const ALL_TRANSITIONS: [Transition; 7] = [
        Send,
        FirstFragment,
        CompletionMarker,
        Stop,
        TransportFailure,
        Regenerate,
        Retry,
    ];

    macro_rules! test_transitions {
        ( $($name:ident: $from:expr, $via:expr => $to:expr,)+ ) => {
            $(
                #[test]
                fn $name() {
                    assert_eq!($from.next($via), $to);
                }
            )+
        };
    }

    test_transitions! {
        send_from_idle: Idle, Send => Some(Requesting),
        first_fragment_starts_streaming: Requesting, FirstFragment => Some(Streaming),
        failure_before_first_fragment: Requesting, TransportFailure => Some(Error),
        completion_while_streaming: Streaming, CompletionMarker => Some(Completed),
        stop_while_streaming: Streaming, Stop => Some(Stopped),
        failure_while_streaming: Streaming, TransportFailure => Some(Error),
        regenerate_completed: Completed, Regenerate => Some(Requesting),
        regenerate_stopped: Stopped, Regenerate => Some(Requesting),
        regenerate_error: Error, Regenerate => Some(Requesting),
        retry_error: Error, Retry => Some(Requesting),
        stop_before_first_fragment: Requesting, Stop => Some(Stopped),
        empty_response_completes: Requesting, CompletionMarker => Some(Completed),
        retry_completed_rejected: Completed, Retry => None,
        retry_stopped_rejected: Stopped, Retry => None,
        regenerate_streaming_rejected: Streaming, Regenerate => None,
        stop_completed_rejected: Completed, Stop => None,
        second_first_fragment_rejected: Streaming, FirstFragment => None,
        send_twice_rejected: Requesting, Send => None,
    }

    #[test]
    fn live_session_only_while_requesting_or_streaming() {
        for state in ALL_STATES {
            let expected = matches!(state, Requesting | Streaming);
            assert_eq!(state.has_live_session(), expected, "{state}");
            assert_eq!(state.is_settled(), !expected, "{state}");
        }
    }

    #[test]
    fn settled_states_only_leave_through_user_actions() {
        for state in ALL_STATES.into_iter().filter(|s| s.is_settled()) {
            for transition in ALL_TRANSITIONS {
                if let Some(next) = state.next(transition) {
                    assert!(
                        matches!(transition, Send | Regenerate | Retry),
                        "{state} left via {transition:?}"
                    );
                    assert_eq!(next, Requesting);
                }
            }
        }
    }

    #[test]
    fn state_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Streaming).unwrap(), "\"streaming\"");
        assert_eq!(Stopped.to_string(), "stopped");
    }
}
