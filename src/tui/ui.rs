use crate::chat::Chat;
use crate::tui::TuiState;
use crate::tui::component::Component;
use crate::tui::components::{MessageList, TitleBar};

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout};

/// Status shown in the title bar: a transient notice if there is one,
/// otherwise the state of the latest assistant message.
fn status_text(chat: &Chat, tui: &TuiState) -> String {
    if !tui.status_message.is_empty() {
        return tui.status_message.clone();
    }
    chat.conversation()
        .last_assistant()
        .map(|m| m.state.label().to_string())
        .unwrap_or_default()
}

pub fn draw_ui(frame: &mut Frame, chat: &Chat, tui: &mut TuiState) {
    use Constraint::{Length, Min};
    let input_height = tui.input_box.calculate_height(frame.area().width);
    let layout = Layout::vertical([Length(1), Min(0), Length(input_height)]);
    let [title_area, main_area, input_area] = layout.areas(frame.area());

    // Message list first so the title bar sees this frame's follow state
    MessageList::new(&mut tui.message_list, chat.messages()).render(frame, main_area);

    let mut title_bar = TitleBar::new(
        chat.selector().select_kind().to_string(),
        tui.base_url.clone(),
        status_text(chat, tui),
        tui.message_list.has_unseen_content(),
    );
    title_bar.render(frame, title_area);

    tui.input_box.render(frame, input_area);
}
