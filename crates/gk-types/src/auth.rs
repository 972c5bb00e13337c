//! Front-end login types.

use serde::{Deserialize, Serialize};

/// Outcome of a front-end authentication attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthDecision {
    Accept,
    Reject,
}

/// Parsed SSH login name: `<user>[:[<account>@]<target>]`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginTarget {
    /// Front-end user name, authenticated against the user table.
    pub username: String,
    /// Target account name; `None` means the target's default account.
    pub account: Option<String>,
    /// Target name; `None` means "list what I can reach".
    pub target: Option<String>,
}
