//! # TUI Components
//!
//! ## Stateless Components (Props-Based Rendering)
//!
//! - `TitleBar`: transport, backend, status and the "↓ New" hint
//! - `Message`: one conversation message with its lifecycle state
//!
//! ## Stateful Components (Event-Driven)
//!
//! - `InputBox`: prompt editor, locked while a response streams
//! - `MessageList`: scrollable conversation view with layout caching and
//!   auto-follow
//!
//! Components receive external data as props (struct fields), never by
//! reaching into `Chat` directly:
//!
//! ```rust,ignore
//! let mut title_bar = TitleBar::new(transport, base_url, status, unseen);
//! title_bar.render(frame, area);
//! ```
//!
//! ```text
//! components/
//! ├── mod.rs
//! ├── title_bar.rs     (Top status bar)
//! ├── message.rs       (Single message renderer)
//! ├── message_list.rs  (Scrollable message container)
//! └── input_box/       (Prompt editor)
//! ```

mod title_bar;
pub use title_bar::TitleBar;

pub mod input_box;
pub mod message;
pub use input_box::{InputBox, InputEvent};
pub mod message_list;
pub use message_list::{MessageList, MessageListState};
