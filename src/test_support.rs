//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::transport::{FragmentStream, Transport, TransportEvent, TransportKind};

/// One scripted step of a fake session.
#[derive(Debug, Clone)]
pub enum Step {
    Event(TransportEvent),
    Delay(Duration),
    /// Never yields again until cancelled.
    Stall,
}

/// In-memory transport that replays the same script on every `open`.
#[derive(Clone)]
pub struct ScriptedTransport {
    kind: TransportKind,
    script: Vec<Step>,
    prompts: Arc<Mutex<Vec<String>>>,
    tokens: Arc<Mutex<Vec<CancellationToken>>>,
}

impl ScriptedTransport {
    pub fn new(kind: TransportKind, script: Vec<Step>) -> Self {
        Self {
            kind,
            script,
            prompts: Arc::default(),
            tokens: Arc::default(),
        }
    }

    /// Prompts passed to `open`, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Resolves once the most recently opened session is cancelled.
    pub async fn wait_cancelled(&self) {
        let token = self.tokens.lock().unwrap().last().cloned();
        if let Some(token) = token {
            token.cancelled().await;
        }
    }
}

impl Transport for ScriptedTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn open(&self, prompt: &str, cancel: CancellationToken) -> FragmentStream {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.tokens.lock().unwrap().push(cancel.clone());

        let steps: VecDeque<Step> = self.script.iter().cloned().collect();
        stream::unfold((steps, cancel), |(mut steps, cancel)| async move {
            loop {
                if cancel.is_cancelled() {
                    return None;
                }
                match steps.pop_front()? {
                    Step::Event(event) => return Some((event, (steps, cancel))),
                    Step::Delay(duration) => {
                        tokio::select! {
                            _ = cancel.cancelled() => return None,
                            _ = tokio::time::sleep(duration) => {}
                        }
                    }
                    Step::Stall => {
                        cancel.cancelled().await;
                        return None;
                    }
                }
            }
        })
        .boxed()
    }
}
