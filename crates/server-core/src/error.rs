use thiserror::Error;

use crate::relay::ChannelError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    #[error("SSH key error: {0}")]
    SshKey(#[from] russh::keys::Error),

    #[error("Authentication failed via {0}")]
    AuthFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Password hash error: {0}")]
    PasswordHash(String),

    #[error("{0} '{1}' not found")]
    NotFound(String, String),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Interactive prompt was cancelled")]
    PromptCancelled,

    #[error("Other error: {0}")]
    Other(String),
}

impl ServerError {
    pub fn not_found(kind: &str, name: impl AsRef<str>) -> Self {
        Self::NotFound(kind.to_string(), name.as_ref().to_string())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
