//! murmur library: streaming chat pipeline plus the terminal front end.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub mod chat;
pub mod core;
pub mod headless;
pub mod transport;
pub mod tui;

#[cfg(test)]
pub mod test_support;

pub use chat::Chat;

/// Which transport to use for new sessions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportPreference {
    /// Event-stream when supported, chunked-body otherwise.
    #[default]
    Auto,
    EventStream,
    ChunkedBody,
}
