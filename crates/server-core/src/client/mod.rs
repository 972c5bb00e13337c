//! Front-end side of a proxied session: the already-authenticated user's terminal.

pub mod line_editor;

use async_trait::async_trait;
use gk_types::{Identity, TerminalSize};
use tokio::sync::watch;
use tracing::trace;

pub use line_editor::{LineEditor, LineOutcome};

use crate::{
    error::{ServerError, ServerResult},
    relay::ChannelError,
};

/// A line answered at a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptLine {
    pub line: String,
    /// Bytes typed ahead of the prompt's Enter, owed to whoever reads input next.
    pub typeahead: Vec<u8>,
}

/// Terminal type and live size of the client pty.
#[derive(Clone, Debug)]
pub struct TerminalMeta {
    term: String,
    sizes: watch::Receiver<TerminalSize>,
}

impl TerminalMeta {
    pub fn new(term: impl Into<String>, sizes: watch::Receiver<TerminalSize>) -> Self {
        Self { term: term.into(), sizes }
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn size(&self) -> TerminalSize {
        *self.sizes.borrow()
    }

    /// A receiver that reports only size changes made after this call.
    pub fn resize_events(&self) -> watch::Receiver<TerminalSize> {
        let mut rx = self.sizes.clone();
        rx.borrow_and_update();
        rx
    }
}

#[async_trait]
pub trait ClientChannel: Send + Sync {
    fn identity(&self) -> &Identity;

    fn terminal(&self) -> &TerminalMeta;

    async fn send(&self, data: &[u8]) -> Result<(), ChannelError>;

    /// Next chunk of raw client input; `None` once the client has gone.
    async fn recv(&self) -> Option<Vec<u8>>;

    async fn send_text(&self, text: &str) -> Result<(), ChannelError> {
        self.send(text.as_bytes()).await
    }

    /// Prompt and read one line of input. With `echo` false the typed characters are not shown.
    async fn read_line(&self, prompt: &str, echo: bool) -> ServerResult<PromptLine> {
        self.send_text(prompt).await?;
        let mut editor = LineEditor::new(echo);
        loop {
            let Some(chunk) = self.recv().await else {
                return Err(ServerError::PromptCancelled);
            };
            let step = editor.feed(&chunk);
            if !step.echo.is_empty() {
                self.send(&step.echo).await?;
            }
            match step.outcome {
                Some(LineOutcome::Submitted(line)) => {
                    trace!(len = line.len(), typeahead = step.rest.len(), echo, "prompt answered");
                    return Ok(PromptLine {
                        line,
                        typeahead: step.rest,
                    });
                }
                Some(LineOutcome::Cancelled) => return Err(ServerError::PromptCancelled),
                None => {}
            }
        }
    }
}
