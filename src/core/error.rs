//! # Errors
//!
//! Two families of failure meet in the core:
//!
//! - **Turn failures** (`ConnectionError`, `StreamInterrupted`, `BackendError`)
//!   come out of a transport. They never reach the caller as a `Result`;
//!   the controller records them on the assistant message as an
//!   [`ErrorDescriptor`] and moves it to `error`.
//! - **Call rejections** (`Busy`, `InvalidTransition`, `UnknownMessage`) are
//!   returned synchronously from `send`/`stop`/`regenerate`/`retry` and leave
//!   every message untouched.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::lifecycle::MessageState;
use crate::core::message::MessageId;
use crate::transport::TransportError;

/// Rejections returned from the controller's call surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// A StreamSession is already live for this conversation.
    #[error("a response is already streaming")]
    Busy,
    /// The message is in a state that does not allow the requested action.
    #[error("cannot {action} a message that is {state}")]
    InvalidTransition {
        action: &'static str,
        state: MessageState,
    },
    /// No message with this id exists in the conversation.
    #[error("unknown message {0}")]
    UnknownMessage(MessageId),
}

/// Machine-readable category stored on a failed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    ConnectionError,
    StreamInterrupted,
    BackendError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::ConnectionError => "connection_error",
            ErrorCode::StreamInterrupted => "stream_interrupted",
            ErrorCode::BackendError => "backend_error",
        }
    }
}

/// `{ code, message }` attached to a message in the `error` state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub code: ErrorCode,
    pub message: String,
    /// HTTP status, when the backend answered with one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl From<&TransportError> for ErrorDescriptor {
    fn from(err: &TransportError) -> Self {
        let (code, status) = match err {
            TransportError::Connection(_) => (ErrorCode::ConnectionError, None),
            TransportError::Interrupted(_) => (ErrorCode::StreamInterrupted, None),
            TransportError::Backend { status, .. } => (ErrorCode::BackendError, *status),
        };
        Self {
            code,
            message: err.to_string(),
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_maps_each_transport_failure() {
        let conn = ErrorDescriptor::from(&TransportError::Connection("refused".into()));
        assert_eq!(conn.code, ErrorCode::ConnectionError);
        assert_eq!(conn.status, None);

        let cut = ErrorDescriptor::from(&TransportError::Interrupted("reset".into()));
        assert_eq!(cut.code, ErrorCode::StreamInterrupted);

        let backend = ErrorDescriptor::from(&TransportError::Backend {
            status: Some(503),
            message: "overloaded".into(),
        });
        assert_eq!(backend.code, ErrorCode::BackendError);
        assert_eq!(backend.status, Some(503));
        assert!(backend.message.contains("overloaded"));
    }

    #[test]
    fn error_code_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorCode::StreamInterrupted).unwrap();
        assert_eq!(json, "\"stream_interrupted\"");
        assert_eq!(ErrorCode::BackendError.as_str(), "backend_error");
    }

    #[test]
    fn invalid_transition_names_action_and_state() {
        let err = ChatError::InvalidTransition {
            action: "retry",
            state: MessageState::Completed,
        };
        assert_eq!(err.to_string(), "cannot retry a message that is completed");
    }
}
