//! Session proxy runtime.
//!
//! A [`proxy::ProxyServer`] takes an authenticated client, checks access, resolves account
//! credentials, connects to the target while showing a progress counter, and bridges the two
//! until either side closes. The [`ssh_server`] module exposes it over an SSH listener.

pub mod access;
pub mod auth;
pub mod authz;
pub mod bridge;
pub mod client;
pub mod config;
pub mod credential;
pub mod error;
pub mod format;
pub mod logging;
pub mod progress;
pub mod proxy;
pub mod recorder;
pub mod relay;
pub mod resize;
pub mod sessions;
pub mod ssh_server;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{ServerError, ServerResult};
pub use proxy::{ProxyContext, ProxyOutcome, ProxyServer, ProxySession};
pub use ssh_server::run_ssh_server;
