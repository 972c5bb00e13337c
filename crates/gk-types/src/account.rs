//! Target account descriptors and the secrets used to authenticate them.
use std::fmt;

use secrecy::{ExposeSecret, SecretBox};

/// Heap-allocated secret string that is zeroized on drop and redacted in `Debug` output.
pub type SecretBoxedString = SecretBox<String>;

pub fn secret_string(value: impl Into<String>) -> SecretBoxedString {
    SecretBox::new(Box::new(value.into()))
}

/// Material used to authenticate an account on a target. Exactly one kind is ever present.
#[derive(Debug)]
pub enum AccountSecret {
    Password(SecretBoxedString),
    PrivateKey {
        /// PEM/OpenSSH encoded private key.
        key: SecretBoxedString,
        /// Passphrase protecting `key`, if any.
        passphrase: Option<SecretBoxedString>,
    },
}

impl AccountSecret {
    pub fn password(value: impl Into<String>) -> Self {
        Self::Password(secret_string(value))
    }

    pub fn private_key(key: impl Into<String>, passphrase: Option<String>) -> Self {
        Self::PrivateKey {
            key: secret_string(key),
            passphrase: passphrase.map(secret_string),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Password(_) => "password",
            Self::PrivateKey { .. } => "private_key",
        }
    }
}

/// The account to authenticate as on a target.
///
/// The secret starts empty and is populated once by the credential resolver before any
/// connection attempt; later writes are refused.
#[derive(Debug)]
pub struct AccountDescriptor {
    /// Configured account name (what users type before `@`).
    pub name: String,
    /// Login name on the target host.
    pub username: String,
    secret: Option<AccountSecret>,
}

impl AccountDescriptor {
    pub fn new(name: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            username: username.into(),
            secret: None,
        }
    }

    pub fn secret(&self) -> Option<&AccountSecret> {
        self.secret.as_ref()
    }

    pub fn has_secret(&self) -> bool {
        self.secret.is_some()
    }

    /// Populate the secret. Returns the rejected value if one was already set.
    pub fn set_secret(&mut self, secret: AccountSecret) -> Result<(), AccountSecret> {
        if self.secret.is_some() {
            return Err(secret);
        }
        self.secret = Some(secret);
        Ok(())
    }

    pub fn password(&self) -> Option<&str> {
        match &self.secret {
            Some(AccountSecret::Password(pw)) => Some(pw.expose_secret().as_str()),
            _ => None,
        }
    }

    pub fn private_key(&self) -> Option<&str> {
        match &self.secret {
            Some(AccountSecret::PrivateKey { key, .. }) => Some(key.expose_secret().as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for AccountDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.username)
    }
}
