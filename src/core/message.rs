//! # Messages
//!
//! The conversation's unit of display. A user prompt and its assistant
//! placeholder are created together; the assistant message then moves
//! through [`MessageState`] as its StreamSession progresses.
//!
//! ```text
//! Message
//! ├── id: MessageId
//! ├── role: user | assistant | system
//! ├── state: MessageState
//! ├── content: { text, code_blocks[] }
//! ├── created_at
//! ├── reply_to: Option<MessageId>     // assistant → paired user prompt
//! ├── error: Option<ErrorDescriptor>  // only while state == error
//! └── versions: Vec<MessageVersion>   // archived by regenerate
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::error::ErrorDescriptor;
use crate::core::lifecycle::MessageState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// A fenced (or indented) code block found in a message's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlock {
    /// First word of the fence info string, if any (`rust` in ```` ```rust ````).
    pub language: Option<String>,
    pub code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContent {
    pub text: String,
    pub code_blocks: Vec<CodeBlock>,
}

impl MessageContent {
    pub fn from_text(text: impl Into<String>) -> Self {
        let mut content = Self {
            text: text.into(),
            code_blocks: Vec::new(),
        };
        content.refresh_code_blocks();
        content
    }

    /// Re-derives `code_blocks` from `text`. `text` itself is never touched.
    pub fn refresh_code_blocks(&mut self) {
        self.code_blocks = extract_code_blocks(&self.text);
    }
}

/// Parses `text` as CommonMark and collects every code block in order.
/// An unterminated fence (mid-stream) runs to the end of the text.
pub fn extract_code_blocks(text: &str) -> Vec<CodeBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<CodeBlock> = None;

    for event in Parser::new(text) {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let language = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .map(str::to_string),
                    CodeBlockKind::Indented => None,
                };
                current = Some(CodeBlock {
                    language,
                    code: String::new(),
                });
            }
            Event::Text(chunk) => {
                if let Some(block) = current.as_mut() {
                    block.code.push_str(&chunk);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some(block) = current.take() {
                    blocks.push(block);
                }
            }
            _ => {}
        }
    }

    blocks
}

/// Content archived by `regenerate`, newest last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageVersion {
    pub content: MessageContent,
    /// State the content was in when archived (completed, stopped or error).
    pub state: MessageState,
    pub archived_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub state: MessageState,
    pub content: MessageContent,
    pub created_at: DateTime<Utc>,
    pub reply_to: Option<MessageId>,
    pub error: Option<ErrorDescriptor>,
    pub versions: Vec<MessageVersion>,
}

impl Message {
    fn new(role: Role, state: MessageState, text: String, reply_to: Option<MessageId>) -> Self {
        Self {
            id: MessageId::new(),
            role,
            state,
            content: MessageContent::from_text(text),
            created_at: Utc::now(),
            reply_to,
            error: None,
            versions: Vec::new(),
        }
    }

    /// A submitted prompt. User messages are complete the moment they exist.
    pub fn user(prompt: impl Into<String>) -> Self {
        Self::new(Role::User, MessageState::Completed, prompt.into(), None)
    }

    /// Empty placeholder paired with the user message `reply_to`.
    pub fn assistant_placeholder(reply_to: MessageId) -> Self {
        Self::new(Role::Assistant, MessageState::Idle, String::new(), Some(reply_to))
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, MessageState::Completed, text.into(), None)
    }

    pub fn text(&self) -> &str {
        &self.content.text
    }

    /// Moves the current content into the version list and clears it.
    pub fn archive_content(&mut self) {
        let content = std::mem::take(&mut self.content);
        self.versions.push(MessageVersion {
            content,
            state: self.state,
            archived_at: Utc::now(),
        });
    }

    /// Drops content and error without keeping a version.
    pub fn discard_content(&mut self) {
        self.content = MessageContent::default();
        self.error = None;
    }

    pub fn view(&self) -> MessageView<'_> {
        MessageView {
            id: self.id,
            role: self.role,
            state: self.state,
            text: &self.content.text,
            error: self.error.as_ref(),
        }
    }
}

/// Renderer-facing snapshot: `{ state, text, error? }` plus identity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MessageView<'a> {
    pub id: MessageId,
    pub role: Role,
    pub state: MessageState,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a ErrorDescriptor>,
}
