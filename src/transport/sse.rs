//! `text/event-stream` framing.
//!
//! Feed decoded text in whatever pieces the network delivers; complete
//! events come out once their terminating blank line has been seen.
//!
//! - lines end in `\n`, `\r\n` or `\r` (a `\r\n` split across feeds counts once)
//! - `field: value` strips exactly one space after the colon
//! - multiple `data:` lines are joined with `\n`
//! - lines starting with `:` are comments
//! - an event with no data and no name is not dispatched

use log::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the `event:` field; `None` means the default `message` type.
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    line: String,
    after_cr: bool,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, text: &str) -> Vec<SseEvent> {
        let mut events = Vec::new();
        for ch in text.chars() {
            if self.after_cr {
                self.after_cr = false;
                if ch == '\n' {
                    continue;
                }
            }
            match ch {
                '\r' => {
                    self.after_cr = true;
                    self.end_line(&mut events);
                }
                '\n' => self.end_line(&mut events),
                c => self.line.push(c),
            }
        }
        events
    }

    /// True if a partially received event is buffered.
    pub fn has_partial(&self) -> bool {
        !self.line.is_empty() || !self.data.is_empty() || self.event.is_some()
    }

    fn end_line(&mut self, events: &mut Vec<SseEvent>) {
        let line = std::mem::take(&mut self.line);

        if line.is_empty() {
            if let Some(event) = self.dispatch() {
                events.push(event);
            }
            return;
        }
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.find(':') {
            Some(i) => {
                let value = &line[i + 1..];
                (&line[..i], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line.as_str(), ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            "retry" => {}
            other => debug!("Ignoring unknown SSE field '{}'", other),
        }
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        let id = self.id.take();
        if self.data.is_empty() && event.is_none() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent { event, data, id })
    }
}
