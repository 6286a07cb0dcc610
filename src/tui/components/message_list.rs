//! # MessageList Component
//!
//! Scrollable view of the conversation.
//!
//! `MessageList` is created each frame around `&mut MessageListState`
//! (persistent) and the message slice (props). Auto-follow decisions are
//! delegated to the core [`ScrollFollow`] controller, which is fed terminal
//! rows instead of pixels:
//!
//! - every scroll event sends an `(offset, content, viewport)` sample
//! - content and viewport height changes ask it for a [`ScrollCommand`]
//! - `End` is the "jump to latest" affordance

use ratatui::Frame;
use ratatui::layout::{Position, Rect, Size};
use tui_scrollview::{ScrollView, ScrollViewState, ScrollbarVisibility};

use crate::core::message::{Message as ChatMessage, MessageId};
use crate::core::lifecycle::MessageState;
use crate::core::scroll::{ScrollCommand, ScrollFollow, ScrollSample};
use crate::tui::component::{Component, EventHandler};
use crate::tui::components::message::Message;
use crate::tui::event::TuiEvent;

/// Rough terminal row height used to turn the pixel threshold into rows.
pub const ROW_HEIGHT_PX: f64 = 24.0;

/// Converts a pixel threshold into a whole number of rows (at least one).
pub fn rows_for_threshold(threshold_px: f64) -> f64 {
    (threshold_px / ROW_HEIGHT_PX).round().max(1.0)
}

/// Layout and scroll state for the message list.
/// Must be persisted in the parent TuiState.
pub struct MessageListState {
    pub scroll_state: ScrollViewState,
    pub layout: LayoutCache,
    pub follow: ScrollFollow,
    /// Last known viewport height (for scroll clamping between frames)
    pub viewport_height: u16,
    /// Content and viewport heights last reported to `follow`
    reported_height: Option<u16>,
    reported_viewport: Option<u16>,
}

impl MessageListState {
    pub fn new(follow: ScrollFollow) -> Self {
        Self {
            scroll_state: ScrollViewState::default(),
            layout: LayoutCache::new(),
            follow,
            viewport_height: 0,
            reported_height: None,
            reported_viewport: None,
        }
    }

    pub fn content_height(&self) -> u16 {
        self.layout.total_height()
    }

    fn max_offset(&self) -> u16 {
        self.content_height().saturating_sub(self.viewport_height)
    }

    fn set_offset_y(&mut self, y: u16) {
        self.scroll_state.set_offset(Position { x: 0, y });
    }

    /// Clamp scroll offset so it never exceeds the content bounds.
    pub fn clamp_scroll(&mut self) {
        let max_y = self.max_offset();
        if self.scroll_state.offset().y > max_y {
            self.set_offset_y(max_y);
        }
    }

    fn sample(&self) -> ScrollSample {
        ScrollSample::new(
            self.scroll_state.offset().y as f64,
            self.content_height() as f64,
            self.viewport_height as f64,
        )
    }

    fn report_scroll(&mut self) {
        self.clamp_scroll();
        let sample = self.sample();
        self.follow.on_scroll(sample);
    }

    fn execute(&mut self, command: ScrollCommand) {
        match command {
            ScrollCommand::ScrollToBottom { .. } => {
                let max_y = self.max_offset();
                self.set_offset_y(max_y);
            }
            ScrollCommand::None => {}
        }
    }

    /// The "jump to latest" affordance.
    pub fn jump_to_latest(&mut self) {
        let command = self.follow.jump_to_latest();
        self.execute(command);
    }

    /// Feeds a content-height change to the follow controller and applies
    /// its command. No-op when the height is unchanged.
    pub fn content_changed(&mut self, content_height: u16) {
        if self.reported_height == Some(content_height) {
            return;
        }
        self.reported_height = Some(content_height);
        let command = self.follow.on_content_change(content_height as f64);
        self.execute(command);
        self.clamp_scroll();
    }

    /// Feeds a viewport-height change to the follow controller.
    pub fn viewport_changed(&mut self, viewport_height: u16) {
        self.viewport_height = viewport_height;
        if self.reported_viewport == Some(viewport_height) {
            return;
        }
        self.reported_viewport = Some(viewport_height);
        let command = self.follow.on_resize(viewport_height as f64);
        self.execute(command);
        self.clamp_scroll();
    }

    pub fn has_unseen_content(&self) -> bool {
        self.follow.affordance_visible()
    }
}

/// Scrollable conversation view component.
pub struct MessageList<'a> {
    pub state: &'a mut MessageListState,
    pub messages: &'a [ChatMessage],
}

impl<'a> MessageList<'a> {
    pub fn new(state: &'a mut MessageListState, messages: &'a [ChatMessage]) -> Self {
        Self { state, messages }
    }
}

impl<'a> Component for MessageList<'a> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let content_width = area.width.saturating_sub(1); // -1 for scrollbar safe area

        self.state.layout.update(self.messages, content_width);
        self.state.viewport_changed(area.height);
        let total_height = self.state.content_height();
        self.state.content_changed(total_height);
        self.state.clamp_scroll();

        let scroll_offset = self.state.scroll_state.offset().y;
        let visible_range = self.state.layout.visible_range(scroll_offset, area.height);

        let mut scroll_view = ScrollView::new(Size::new(content_width, total_height))
            .vertical_scrollbar_visibility(ScrollbarVisibility::Always)
            .horizontal_scrollbar_visibility(ScrollbarVisibility::Never);

        let mut y_offset: u16 = self.state.layout.top_of(visible_range.start);
        for i in visible_range {
            let height = self.state.layout.heights[i];
            let rect = Rect::new(0, y_offset, content_width, height);
            scroll_view.render_widget(Message::new(self.messages[i].view()), rect);
            y_offset = y_offset.saturating_add(height);
        }

        frame.render_stateful_widget(scroll_view, area, &mut self.state.scroll_state);
    }
}

impl EventHandler for MessageListState {
    type Event = ();

    fn handle_event(&mut self, event: &TuiEvent) -> Option<Self::Event> {
        match event {
            TuiEvent::ScrollUp => self.scroll_state.scroll_up(),
            TuiEvent::ScrollDown => self.scroll_state.scroll_down(),
            TuiEvent::ScrollPageUp => self.scroll_state.scroll_page_up(),
            TuiEvent::ScrollPageDown => self.scroll_state.scroll_page_down(),
            TuiEvent::JumpToLatest => {
                self.jump_to_latest();
                return None;
            }
            _ => return None,
        }
        self.report_scroll();
        None
    }
}

/// What a cached height was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HeightKey {
    id: MessageId,
    text_len: usize,
    state: MessageState,
    has_error: bool,
}

impl HeightKey {
    fn of(message: &ChatMessage) -> Self {
        Self {
            id: message.id,
            text_len: message.content.text.len(),
            state: message.state,
            has_error: message.error.is_some(),
        }
    }
}

/// Cached layout measurements
#[derive(Default)]
pub struct LayoutCache {
    pub heights: Vec<u16>,
    pub prefix_heights: Vec<u16>,
    keys: Vec<HeightKey>,
    content_width: u16,
}

impl LayoutCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of leading cached heights still valid for `messages`.
    fn reusable_count(&self, messages: &[ChatMessage], content_width: u16) -> usize {
        if self.content_width != content_width {
            return 0;
        }
        self.keys
            .iter()
            .zip(messages)
            .take_while(|(key, msg)| **key == HeightKey::of(msg))
            .count()
    }

    pub fn update(&mut self, messages: &[ChatMessage], content_width: u16) {
        let reusable = self.reusable_count(messages, content_width);
        self.heights.truncate(reusable);
        self.keys.truncate(reusable);

        for message in &messages[reusable..] {
            self.heights
                .push(Message::calculate_height(&message.view(), content_width));
            self.keys.push(HeightKey::of(message));
        }
        self.content_width = content_width;
        self.rebuild_prefix_heights();
    }

    pub fn total_height(&self) -> u16 {
        self.prefix_heights.last().copied().unwrap_or(0)
    }

    fn top_of(&self, index: usize) -> u16 {
        match index {
            0 => 0,
            i => self.prefix_heights.get(i - 1).copied().unwrap_or(0),
        }
    }

    fn rebuild_prefix_heights(&mut self) {
        self.prefix_heights = self
            .heights
            .iter()
            .scan(0u16, |acc, &h| {
                *acc = acc.saturating_add(h);
                Some(*acc)
            })
            .collect();
    }

    pub fn visible_range(&self, scroll_offset: u16, viewport_height: u16) -> std::ops::Range<usize> {
        let buffer = viewport_height / 2;
        let buffered_start = scroll_offset.saturating_sub(buffer);
        let buffered_end = scroll_offset
            .saturating_add(viewport_height)
            .saturating_add(buffer);

        let start = self
            .prefix_heights
            .partition_point(|&end| end <= buffered_start);
        let end = self
            .prefix_heights
            .partition_point(|&end| end < buffered_end)
            .saturating_add(1)
            .min(self.prefix_heights.len());

        start..end
    }
}
