//! # TUI Adapter
//!
//! The ratatui-specific layer. Handles terminal I/O, renders the UI, and
//! translates keyboard events into [`Chat`] calls.
//!
//! This is the only module that knows about ratatui and crossterm.
//!
//! ## Redraw Strategy
//!
//! - **Streaming**: polls input every ~50ms so fragments queued by the
//!   session task are applied and drawn promptly.
//! - **Idle**: sleeps up to 250ms, only redraws on events or terminal resize.
//!
//! A `SteadyBlock` cursor style is used instead of a blinking cursor because
//! ratatui's `set_cursor_position` resets the terminal's blink timer on every
//! `draw()` call.

mod component;
mod components;
mod event;
mod ui;

use log::{debug, info, warn};
use std::io::stdout;
use std::time::Duration;

use crossterm::cursor::{Hide, SetCursorStyle, Show};
use crossterm::event::{
    DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
    KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::execute;

use crate::chat::Chat;
use crate::core::config::ResolvedConfig;
use crate::core::error::ChatError;
use crate::core::message::MessageId;
use crate::core::scroll::ScrollFollow;
use crate::tui::component::EventHandler;
use crate::tui::components::message_list::rows_for_threshold;
use crate::tui::components::{InputBox, InputEvent, MessageListState};
use crate::tui::event::{TuiEvent, poll_event_immediate, poll_event_timeout};

const STREAMING_POLL: Duration = Duration::from_millis(50);
const IDLE_POLL: Duration = Duration::from_millis(250);

/// TUI-specific presentation state (not part of the chat model)
pub struct TuiState {
    pub message_list: MessageListState,
    pub input_box: InputBox,
    /// Transient notice for the title bar (e.g., a rejected action)
    pub status_message: String,
    pub base_url: String,
}

impl TuiState {
    pub fn new(base_url: String, follow: ScrollFollow) -> Self {
        Self {
            message_list: MessageListState::new(follow),
            input_box: InputBox::new(),
            status_message: String::new(),
            base_url,
        }
    }
}

struct TerminalModeGuard;

impl TerminalModeGuard {
    fn new() -> std::io::Result<Self> {
        // Kitty keyboard protocol is harmlessly ignored by terminals without it
        execute!(
            stdout(),
            EnableMouseCapture,
            EnableBracketedPaste,
            Show,
            SetCursorStyle::SteadyBlock,
            PushKeyboardEnhancementFlags(
                KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                    | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
            )
        )?;
        info!("Terminal modes enabled (mouse, bracketed paste, keyboard enhancement)");
        Ok(Self)
    }
}

impl Drop for TerminalModeGuard {
    fn drop(&mut self) {
        let _ = execute!(
            stdout(),
            PopKeyboardEnhancementFlags,
            DisableMouseCapture,
            DisableBracketedPaste,
            Hide
        );
    }
}

/// Records the outcome of a call on the title bar. Returns true when a
/// session was opened.
fn report(tui: &mut TuiState, action: &str, result: Result<MessageId, ChatError>) -> bool {
    match result {
        Ok(id) => {
            debug!("{} started for message {}", action, id);
            tui.status_message.clear();
            true
        }
        Err(e) => {
            warn!("{} rejected: {}", action, e);
            tui.status_message = format!("{action}: {e}");
            false
        }
    }
}

/// Routes one event. Returns true when the user asked to quit.
fn handle_event(chat: &mut Chat, tui: &mut TuiState, event: TuiEvent) -> bool {
    match event {
        TuiEvent::ForceQuit => return true,
        TuiEvent::Resize => {}
        TuiEvent::Stop => match chat.streaming_message() {
            Some(id) => {
                chat.stop(id);
                tui.status_message.clear();
            }
            None => debug!("Stop ignored: nothing is streaming"),
        },
        TuiEvent::Regenerate | TuiEvent::Retry => {
            let Some(id) = chat.conversation().last_assistant().map(|m| m.id) else {
                tui.status_message = "Nothing to regenerate yet".into();
                return false;
            };
            let started = if event == TuiEvent::Regenerate {
                let result = chat.regenerate(id);
                report(tui, "Regenerate", result)
            } else {
                let result = chat.retry(id);
                report(tui, "Retry", result)
            };
            if started {
                tui.message_list.jump_to_latest();
            }
        }
        TuiEvent::ScrollUp
        | TuiEvent::ScrollDown
        | TuiEvent::ScrollPageUp
        | TuiEvent::ScrollPageDown
        | TuiEvent::JumpToLatest => {
            tui.message_list.handle_event(&event);
        }
        TuiEvent::InputChar(_) | TuiEvent::Paste(_) | TuiEvent::Backspace | TuiEvent::Submit => {
            if let Some(InputEvent::Submit(text)) = tui.input_box.handle_event(&event) {
                let result = chat.send(text.clone());
                if result.is_err() {
                    tui.input_box.restore(text);
                }
                if report(tui, "Send", result) {
                    tui.message_list.jump_to_latest();
                }
            }
        }
    }
    false
}

pub fn run(mut chat: Chat, config: &ResolvedConfig) -> std::io::Result<()> {
    let follow = ScrollFollow::new(rows_for_threshold(config.near_bottom_threshold));
    let mut tui = TuiState::new(config.base_url.clone(), follow);

    let mut terminal = ratatui::init();
    let _terminal_mode_guard = TerminalModeGuard::new();

    let mut needs_redraw = true; // Force first frame

    loop {
        tui.input_box.locked = chat.is_busy();

        if needs_redraw {
            terminal.draw(|f| ui::draw_ui(f, &chat, &mut tui))?;
            needs_redraw = false;
        }

        let timeout = if chat.is_busy() { STREAMING_POLL } else { IDLE_POLL };
        let first_event = poll_event_timeout(timeout);
        if first_event.is_some() {
            needs_redraw = true;
        }

        // Process first event + drain all pending events before next draw
        let mut should_quit = false;
        for event in first_event
            .into_iter()
            .chain(std::iter::from_fn(poll_event_immediate))
        {
            if handle_event(&mut chat, &mut tui, event) {
                should_quit = true;
                break;
            }
        }

        if should_quit {
            break;
        }

        let updates = chat.drain_updates();
        if !updates.is_empty() {
            needs_redraw = true;
            for update in updates.iter().filter(|u| u.session_ended) {
                info!("Message {} settled as {}", update.message_id, update.state);
            }
        }
    }

    // Don't leave a session streaming into a dropped channel
    if let Some(id) = chat.streaming_message() {
        chat.stop(id);
    }

    ratatui::restore();
    Ok(())
}
