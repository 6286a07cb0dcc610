//! # Core
//!
//! Conversation state and the rules that mutate it. Nothing here does I/O;
//! transports feed it tagged events and renderers read it back.
//!
//! ```text
//!   Transport ──SessionUpdate{epoch, event}──▶ ┌──────────────────┐
//!                                              │ StreamController │
//!   send/stop/regenerate/retry ──────────────▶ │  Conversation    │
//!                                              │  Accumulator     │
//!                                              └────────┬─────────┘
//!                                                       │ MessageView
//!                                                       ▼
//!                           content length ──▶ ScrollFollow ──▶ ScrollCommand
//! ```
//!
//! ## Modules
//!
//! - [`accumulator`]: fragment concatenation
//! - [`lifecycle`]: per-message state machine
//! - [`message`] / [`conversation`]: the data the renderer draws
//! - [`controller`]: session ownership, epochs, the call surface
//! - [`scroll`]: auto-follow decisions
//! - [`config`]: layered settings

pub mod accumulator;
pub mod config;
pub mod controller;
pub mod conversation;
pub mod error;
pub mod lifecycle;
pub mod message;
pub mod scroll;

pub use controller::{Epoch, MessageUpdate, SessionTicket, SessionUpdate, StreamController};
pub use error::{ChatError, ErrorCode, ErrorDescriptor};
pub use lifecycle::MessageState;
pub use message::{Message, MessageId, MessageView, Role};
