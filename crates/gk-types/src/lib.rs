//! Shared domain types for the gatekeeper session proxy.
//!
//! These types are intentionally dependency-light so they can be reused by the CLI,
//! config loaders and the runtime without pulling in protocol implementations.

pub mod account;
pub mod auth;
pub mod config;
pub mod identity;
pub mod target;
pub mod terminal;

pub use account::{AccountDescriptor, AccountSecret, SecretBoxedString};
pub use auth::{AuthDecision, LoginTarget};
pub use identity::Identity;
pub use target::TargetDescriptor;
pub use terminal::TerminalSize;
