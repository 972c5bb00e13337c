use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use gk_types::config::GatekeeperConfig;

pub const DEFAULT_CONFIG_PATH: &str = "gatekeeper.toml";

#[derive(Clone, Debug, Parser)]
#[command(name = "gk-server", about = "SSH session proxy with per-target access control")]
pub struct ServerArgs {
    /// Path to the TOML config file
    #[arg(short, long, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
    /// Address to bind the SSH listener to (overrides server.bind)
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,
    /// Listening port (overrides server.port)
    #[arg(short = 'P', long, value_name = "PORT")]
    pub port: Option<u16>,
    /// Log level when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub cmd: Option<ServerSubcommand>,
}

#[derive(Clone, Debug, Subcommand, PartialEq, Eq)]
pub enum ServerSubcommand {
    /// Print an argon2 hash for a [[users]] password_hash entry
    HashPassword {
        /// Password to hash; read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Validate the config file and print a summary
    CheckConfig,
}

impl ServerArgs {
    pub fn apply_overrides(&self, config: &mut GatekeeperConfig) {
        if let Some(bind) = &self.bind {
            config.server.bind = bind.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
    }

    /// Level to run at: `--log-level` when given, otherwise `server.log_level` from the config.
    pub fn effective_log_level(&self, config: &GatekeeperConfig) -> Option<String> {
        self.log_level.clone().or_else(|| config.server.log_level.clone())
    }

    /// Load and validate the config file, then apply command-line overrides.
    pub fn load_config(&self) -> anyhow::Result<GatekeeperConfig> {
        let mut config = server_core::config::load_config(&self.config)
            .with_context(|| format!("failed to load config from {}", self.config.display()))?;
        self.apply_overrides(&mut config);
        Ok(config)
    }
}

pub fn summarize(config: &GatekeeperConfig) -> String {
    format!(
        "config OK: {} users, {} targets, {} accounts, {} grants; listening on {}:{}",
        config.users.len(),
        config.targets.len(),
        config.accounts.len(),
        config.grants.len(),
        config.server.bind,
        config.server.port
    )
}
