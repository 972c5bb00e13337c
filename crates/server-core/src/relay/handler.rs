//! Client-side russh handler enforcing the target's pinned host key.

use std::sync::{Arc, Mutex};

use russh::{client, keys};
use tracing::warn;

pub struct TargetKeyHandler {
    pub expected_key: Option<String>,
    pub target_name: String,
    /// Filled with a description when the presented key does not match the pin.
    pub mismatch: Arc<Mutex<Option<String>>>,
}

impl TargetKeyHandler {
    pub fn new(expected_key: Option<String>, target_name: impl Into<String>) -> Self {
        Self {
            expected_key,
            target_name: target_name.into(),
            mismatch: Arc::new(Mutex::new(None)),
        }
    }
}

/// Compare the algorithm and key body of two OpenSSH public keys, ignoring comments.
pub(crate) fn same_public_key(expected: &str, presented: &str) -> bool {
    let left: Vec<&str> = expected.split_whitespace().take(2).collect();
    let right: Vec<&str> = presented.split_whitespace().take(2).collect();
    left.len() == 2 && left == right
}

impl client::Handler for TargetKeyHandler {
    type Error = russh::Error;

    fn check_server_key(
        &mut self,
        server_public_key: &keys::PublicKey,
    ) -> impl std::future::Future<Output = std::result::Result<bool, Self::Error>> + Send {
        let expected = self.expected_key.clone();
        let target = self.target_name.clone();
        let mismatch = self.mismatch.clone();
        let key_str_res = server_public_key.to_openssh().map(|k| k.to_string());

        async move {
            let key_str = match key_str_res {
                Ok(k) => k,
                Err(_) => return Ok(false),
            };

            if let Some(ref exp) = expected
                && !same_public_key(exp, &key_str)
            {
                warn!(target_name = %target, expected = %exp, presented = %key_str, "host key mismatch");
                if let Ok(mut slot) = mismatch.lock() {
                    *slot = Some(format!("Host key mismatch for {target}"));
                }
                return Ok(false);
            }
            Ok(true)
        }
    }
}
