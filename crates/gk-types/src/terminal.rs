//! Terminal geometry reported by the front-end client.

use serde::{Deserialize, Serialize};

pub const DEFAULT_TERM: &str = "xterm";

/// Width/height of the client terminal in character cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSize {
    pub cols: u32,
    pub rows: u32,
}

impl TerminalSize {
    pub fn new(cols: u32, rows: u32) -> Self {
        Self { cols, rows }
    }

    /// Clamp both dimensions to at least one cell; some clients report 0x0 before the first draw.
    pub fn clamped(self) -> Self {
        Self {
            cols: self.cols.max(1),
            rows: self.rows.max(1),
        }
    }
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}
