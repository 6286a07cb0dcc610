//! # Conversation
//!
//! Ordered list of messages. Holds no transport state; the controller
//! owns sessions and mutates messages through [`Conversation::get_mut`].

use crate::core::message::{Message, MessageId, Role};

#[derive(Debug, Default, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the conversation with a system message.
    pub fn with_system(text: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(text)],
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn get_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    /// Appends a user prompt and its assistant placeholder. Returns
    /// `(user_id, assistant_id)`.
    pub fn push_turn(&mut self, prompt: impl Into<String>) -> (MessageId, MessageId) {
        let user = Message::user(prompt);
        let assistant = Message::assistant_placeholder(user.id);
        let ids = (user.id, assistant.id);
        self.messages.push(user);
        self.messages.push(assistant);
        ids
    }

    /// Prompt text paired with an assistant message.
    pub fn prompt_for(&self, assistant_id: MessageId) -> Option<&str> {
        let reply_to = self.get(assistant_id)?.reply_to?;
        self.get(reply_to).map(Message::text)
    }

    /// Most recent assistant message, if any.
    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant)
    }
}
