use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, BorderType, Padding, Paragraph, Widget, Wrap};

use crate::core::lifecycle::MessageState;
use crate::core::message::{MessageView, Role};
use crate::tui::component::Component;

/// Horizontal padding (per side) between the border and text content.
const CONTENT_PAD_H: u16 = 1;
/// Total horizontal space consumed by borders (1 left + 1 right) and padding.
const HORIZONTAL_OVERHEAD: u16 = 2 + CONTENT_PAD_H * 2;
/// Total vertical space consumed by borders (1 top + 1 bottom).
const VERTICAL_OVERHEAD: u16 = 2;

const WAITING_PLACEHOLDER: &str = "…";

/// A stateless component that renders one chat message.
///
/// The border title carries the role and, for assistant messages, the
/// lifecycle state (`assistant · streaming`). A message in `error` shows
/// its descriptor under the partial text.
///
/// [`calculate_height`](Self::calculate_height) predicts the rendered
/// height with `textwrap` so the parent list can lay out a scroll canvas
/// without rendering first.
#[derive(Clone, Copy)]
pub struct Message<'a> {
    pub view: MessageView<'a>,
}

impl<'a> Message<'a> {
    pub fn new(view: MessageView<'a>) -> Self {
        Self { view }
    }

    pub fn calculate_height(view: &MessageView<'_>, width: u16) -> u16 {
        let content_width = width.saturating_sub(HORIZONTAL_OVERHEAD);
        if content_width == 0 {
            // Too narrow for borders + padding; still occupy a row.
            return 1;
        }

        let options = textwrap::Options::new(content_width as usize)
            .break_words(true)
            .word_separator(textwrap::WordSeparator::AsciiSpace);

        let mut lines = 0usize;
        let body = body_text(view);
        if !body.is_empty() {
            lines += textwrap::wrap(body, &options).len();
        }
        if let Some(err) = view.error {
            lines += textwrap::wrap(&error_line(err.code.as_str(), &err.message), &options).len();
        }

        (lines.max(1) as u16).saturating_add(VERTICAL_OVERHEAD)
    }
}

/// Text shown in the body: trailing newlines dropped, placeholder while waiting.
fn body_text<'a>(view: &MessageView<'a>) -> &'a str {
    let text = view.text.trim_end_matches('\n');
    if text.is_empty() && view.state == MessageState::Requesting {
        WAITING_PLACEHOLDER
    } else {
        text
    }
}

fn error_line(code: &str, message: &str) -> String {
    format!("[{code}] {message}")
}

fn title(view: &MessageView<'_>) -> String {
    match view.role {
        Role::Assistant => format!("{} · {}", view.role.label(), view.state),
        _ => view.role.label().to_string(),
    }
}

pub(crate) fn role_style(role: Role) -> Style {
    match role {
        Role::System => Style::default().fg(Color::Yellow),
        Role::User => Style::default().fg(Color::Green),
        Role::Assistant => Style::default().fg(Color::Blue),
    }
}

fn border_style(view: &MessageView<'_>) -> Style {
    let base = role_style(view.role);
    match view.state {
        MessageState::Requesting | MessageState::Streaming => base.add_modifier(Modifier::BOLD),
        MessageState::Error => Style::default().fg(Color::Red),
        MessageState::Stopped => base.add_modifier(Modifier::DIM | Modifier::ITALIC),
        _ => base.add_modifier(Modifier::DIM),
    }
}

impl<'a> Widget for Message<'a> {
    fn render(self, area: Rect, buf: &mut ratatui::buffer::Buffer) {
        let style = role_style(self.view.role);
        let border = border_style(&self.view);

        let block = Block::bordered()
            .title(title(&self.view))
            .border_type(BorderType::Rounded)
            .border_style(border)
            .title_style(border)
            .padding(Padding::horizontal(CONTENT_PAD_H));

        let inner_area = block.inner(area);
        block.render(area, buf);

        let mut text = Text::styled(body_text(&self.view), style);
        if let Some(err) = self.view.error {
            text.push_line(Line::from(Span::styled(
                error_line(err.code.as_str(), &err.message),
                Style::default().fg(Color::Red),
            )));
        }

        Paragraph::new(text)
            .wrap(Wrap { trim: false })
            .render(inner_area, buf);
    }
}

impl<'a> Component for Message<'a> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        frame.render_widget(*self, area);
    }
}
