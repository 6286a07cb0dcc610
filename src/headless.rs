//! Single-prompt mode: stream one reply to stdout and exit.

use std::io::{self, Write};

use log::info;

use crate::chat::Chat;
use crate::core::lifecycle::MessageState;

/// Streams the reply to `prompt` into `out` as fragments arrive. Ctrl+C
/// stops the session. With `json`, prints only the final message view.
pub async fn run<W: Write>(
    chat: &mut Chat,
    prompt: &str,
    json: bool,
    out: &mut W,
) -> io::Result<MessageState> {
    let id = chat.send(prompt).map_err(io::Error::other)?;
    info!("Headless prompt submitted ({} bytes)", prompt.len());

    let mut printed = 0usize;
    while chat.streaming_message() == Some(id) {
        tokio::select! {
            update = chat.next_update() => {
                if update.is_none() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping session");
                chat.stop(id);
            }
        }

        if !json {
            let text = chat.message(id).map(|m| m.text()).unwrap_or_default();
            if let Some(fresh) = text.get(printed..) {
                out.write_all(fresh.as_bytes())?;
                out.flush()?;
            }
            printed = text.len();
        }
    }

    let view = chat
        .view(id)
        .ok_or_else(|| io::Error::other("reply message disappeared"))?;

    if json {
        serde_json::to_writer_pretty(&mut *out, &view)?;
        writeln!(out)?;
    } else {
        writeln!(out)?;
        if let Some(err) = view.error {
            eprintln!("error ({}): {}", err.code.as_str(), err.message);
        }
    }

    Ok(view.state)
}
