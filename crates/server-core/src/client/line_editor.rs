//! Minimal line discipline for prompts answered over a raw pty.

pub const MAX_PROMPT_RESPONSE: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Submitted(String),
    Cancelled,
}

/// Result of feeding one chunk of input.
#[derive(Debug, Default)]
pub struct Step {
    /// Bytes to write back to the client terminal.
    pub echo: Vec<u8>,
    pub outcome: Option<LineOutcome>,
    /// Input that followed a submitted line in the same chunk.
    pub rest: Vec<u8>,
}

pub struct LineEditor {
    buffer: Vec<u8>,
    echo: bool,
}

impl LineEditor {
    pub fn new(echo: bool) -> Self {
        Self { buffer: Vec::new(), echo }
    }

    fn erase(&self, out: &mut Vec<u8>, count: usize) {
        if self.echo {
            for _ in 0..count {
                out.extend_from_slice(b"\x08 \x08");
            }
        }
    }

    /// Feed raw bytes. Bytes after a submitted line are returned in [`Step::rest`], minus the
    /// LF of a CRLF pair. Input after a cancel is discarded.
    pub fn feed(&mut self, data: &[u8]) -> Step {
        let mut step = Step::default();
        for (i, &b) in data.iter().enumerate() {
            match b {
                0x03 => {
                    step.echo.extend_from_slice(b"\r\n^C\r\n");
                    step.outcome = Some(LineOutcome::Cancelled);
                    return step;
                }
                0x04 => {
                    step.echo.extend_from_slice(b"\r\n^D\r\n");
                    step.outcome = Some(LineOutcome::Cancelled);
                    return step;
                }
                0x7f | 0x08 => {
                    if self.buffer.pop().is_some() {
                        self.erase(&mut step.echo, 1);
                    }
                }
                0x15 => {
                    let count = self.buffer.len();
                    self.buffer.clear();
                    self.erase(&mut step.echo, count);
                }
                0x17 => {
                    let mut removed = 0usize;
                    while self.buffer.last().is_some_and(|c| c.is_ascii_whitespace()) {
                        self.buffer.pop();
                        removed += 1;
                    }
                    while self.buffer.last().is_some_and(|c| !c.is_ascii_whitespace()) {
                        self.buffer.pop();
                        removed += 1;
                    }
                    self.erase(&mut step.echo, removed);
                }
                b'\r' | b'\n' => {
                    step.echo.extend_from_slice(b"\r\n");
                    let line = String::from_utf8_lossy(&self.buffer).to_string();
                    self.buffer.clear();
                    step.outcome = Some(LineOutcome::Submitted(line));
                    let mut rest = &data[i + 1..];
                    if b == b'\r' && rest.first() == Some(&b'\n') {
                        rest = &rest[1..];
                    }
                    step.rest = rest.to_vec();
                    return step;
                }
                byte => {
                    if self.buffer.len() >= MAX_PROMPT_RESPONSE {
                        continue;
                    }
                    self.buffer.push(byte);
                    if self.echo {
                        step.echo.push(byte);
                    }
                }
            }
        }
        step
    }
}
