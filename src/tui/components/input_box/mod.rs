//! # InputBox Component
//!
//! Prompt editor. Appends typed and pasted text, submits on Enter, and
//! shows whether a new prompt can be sent right now.
//!
//! The buffer is internal state; `locked` is a prop set by the parent while
//! a response is streaming. Submitting while locked keeps the buffer so the
//! prompt is not lost when the controller answers `Busy`.

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, BorderType, Paragraph, Wrap};
use unicode_width::UnicodeWidthStr;

use crate::tui::component::{Component, EventHandler};
use crate::tui::event::TuiEvent;

/// Rows of text shown before the box stops growing.
const MAX_VISIBLE_LINES: u16 = 6;
/// Borders (1 top + 1 bottom).
const VERTICAL_OVERHEAD: u16 = 2;
/// Borders (1 left + 1 right).
const HORIZONTAL_OVERHEAD: u16 = 2;

/// High-level events emitted by the InputBox
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// User submitted the text (Enter pressed)
    Submit(String),
    ContentChanged,
}

pub struct InputBox {
    pub buffer: String,
    /// True while a session is live (Prop)
    pub locked: bool,
}

impl Default for InputBox {
    fn default() -> Self {
        Self::new()
    }
}

impl InputBox {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            locked: false,
        }
    }

    fn wrapped_lines(&self, width: u16) -> Vec<String> {
        let inner = width.saturating_sub(HORIZONTAL_OVERHEAD).max(1) as usize;
        let options = textwrap::Options::new(inner).break_words(true);
        let mut lines: Vec<String> = textwrap::wrap(&self.buffer, options)
            .into_iter()
            .map(|l| l.into_owned())
            .collect();
        if lines.is_empty() {
            lines.push(String::new());
        }
        lines
    }

    /// Height for the current buffer, between 1 and `MAX_VISIBLE_LINES` rows
    /// of text plus borders.
    pub fn calculate_height(&self, width: u16) -> u16 {
        let lines = self.wrapped_lines(width).len() as u16;
        lines.clamp(1, MAX_VISIBLE_LINES) + VERTICAL_OVERHEAD
    }

    /// Restores a prompt that could not be sent.
    pub fn restore(&mut self, text: String) {
        self.buffer = text;
    }
}

impl Component for InputBox {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let lines = self.wrapped_lines(area.width);
        let skip = lines.len().saturating_sub(MAX_VISIBLE_LINES as usize);
        let visible = lines[skip..].join("\n");

        let (title, border) = if self.locked {
            (
                "Prompt (Esc stops)",
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::DIM),
            )
        } else {
            ("Prompt", Style::default().fg(Color::Green))
        };

        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .border_style(border)
            .title(title);

        let input = Paragraph::new(visible)
            .block(block)
            .wrap(Wrap { trim: false })
            .style(Style::default().fg(Color::Green));
        frame.render_widget(input, area);

        // Cursor sits after the last visible character.
        let last = lines.last().map(String::as_str).unwrap_or_default();
        let row = (lines.len() - skip).saturating_sub(1) as u16;
        let max_x = area.x + area.width.saturating_sub(2);
        let x = (area.x + 1 + last.width() as u16).min(max_x);
        frame.set_cursor_position((x, area.y + 1 + row));
    }
}

impl EventHandler for InputBox {
    type Event = InputEvent;

    fn handle_event(&mut self, event: &TuiEvent) -> Option<Self::Event> {
        match event {
            TuiEvent::InputChar(c) => {
                self.buffer.push(*c);
                Some(InputEvent::ContentChanged)
            }
            TuiEvent::Paste(text) => {
                self.buffer.push_str(text);
                Some(InputEvent::ContentChanged)
            }
            TuiEvent::Backspace => self.buffer.pop().map(|_| InputEvent::ContentChanged),
            TuiEvent::Submit => {
                if self.buffer.trim().is_empty() {
                    None
                } else {
                    Some(InputEvent::Submit(std::mem::take(&mut self.buffer)))
                }
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    #[test]
    fn test_handle_input() {
        let mut input = InputBox::new();

        assert_eq!(
            input.handle_event(&TuiEvent::InputChar('a')),
            Some(InputEvent::ContentChanged)
        );
        input.handle_event(&TuiEvent::InputChar('é'));
        assert_eq!(input.buffer, "aé");

        assert_eq!(
            input.handle_event(&TuiEvent::Backspace),
            Some(InputEvent::ContentChanged)
        );
        assert_eq!(input.buffer, "a");
    }

    #[test]
    fn test_backspace_on_empty_is_none() {
        let mut input = InputBox::new();
        assert_eq!(input.handle_event(&TuiEvent::Backspace), None);
    }

    #[test]
    fn test_submit_takes_buffer_verbatim() {
        let mut input = InputBox::new();
        input.handle_event(&TuiEvent::Paste("  hello\nworld ".into()));

        match input.handle_event(&TuiEvent::Submit) {
            Some(InputEvent::Submit(text)) => assert_eq!(text, "  hello\nworld "),
            other => panic!("Expected Submit event, got {other:?}"),
        }
        assert!(input.buffer.is_empty());
    }

    #[test]
    fn test_blank_submit_ignored() {
        let mut input = InputBox::new();
        input.buffer = "  \n ".into();
        assert_eq!(input.handle_event(&TuiEvent::Submit), None);
        assert_eq!(input.buffer, "  \n ");
    }

    #[test]
    fn test_height_grows_then_caps() {
        let mut input = InputBox::new();
        assert_eq!(input.calculate_height(20), 1 + VERTICAL_OVERHEAD);

        input.buffer = "one\ntwo\nthree".into();
        assert_eq!(input.calculate_height(20), 3 + VERTICAL_OVERHEAD);

        input.buffer = "x\n".repeat(20);
        assert_eq!(input.calculate_height(20), MAX_VISIBLE_LINES + VERTICAL_OVERHEAD);
    }

    #[test]
    fn test_render_shows_lock_state() {
        let mut terminal = Terminal::new(TestBackend::new(40, 3)).unwrap();
        let mut input = InputBox::new();
        input.locked = true;

        terminal.draw(|f| input.render(f, f.area())).unwrap();

        let text: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(text.contains("Esc stops"));
    }
}
