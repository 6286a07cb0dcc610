//! # TitleBar Component
//!
//! Single-line status bar: which transport and backend the next session
//! will use, the current status, and a "↓ New" hint while auto-follow is
//! paused and content is arriving off-screen.
//!
//! Stateless. All fields are props filled in by the parent each frame:
//!
//! 1. **Unseen content**: `"murmur (event-stream @ http://localhost:8000) | streaming | ↓ New (End)"`
//! 2. **Status message**: `"murmur (event-stream @ http://localhost:8000) | streaming"`
//! 3. **Default**: `"murmur (event-stream @ http://localhost:8000)"`

use crate::tui::component::Component;
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::text::Span;

/// Top status bar component.
pub struct TitleBar {
    /// Transport a new session would use (e.g., "chunked-body")
    pub transport: String,
    pub base_url: String,
    /// Status message (e.g., "streaming", "Busy: a response is in progress")
    pub status_message: String,
    /// Whether there's content below the current scroll position
    pub has_unseen_content: bool,
}

impl TitleBar {
    pub fn new(
        transport: String,
        base_url: String,
        status_message: String,
        has_unseen_content: bool,
    ) -> Self {
        Self {
            transport,
            base_url,
            status_message,
            has_unseen_content,
        }
    }

    fn text(&self) -> String {
        let head = format!("murmur ({} @ {})", self.transport, self.base_url);
        match (self.status_message.is_empty(), self.has_unseen_content) {
            (false, true) => format!("{head} | {} | ↓ New (End)", self.status_message),
            (true, true) => format!("{head} | ↓ New (End)"),
            (false, false) => format!("{head} | {}", self.status_message),
            (true, false) => head,
        }
    }
}

impl Component for TitleBar {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        frame.render_widget(Span::raw(self.text()), area);
    }
}
