//! Loading and validating the TOML config file.

use std::{collections::HashSet, path::Path};

use gk_types::config::GatekeeperConfig;
use password_hash::PasswordHash;
use tracing::debug;

use crate::{
    error::{ServerError, ServerResult},
    logging::LEVEL_NAMES,
};

pub fn load_config(path: &Path) -> ServerResult<GatekeeperConfig> {
    let raw = std::fs::read_to_string(path)?;
    let config = parse_config(&raw)?;
    debug!(
        path = %path.display(),
        users = config.users.len(),
        targets = config.targets.len(),
        accounts = config.accounts.len(),
        "loaded config"
    );
    Ok(config)
}

pub fn parse_config(raw: &str) -> ServerResult<GatekeeperConfig> {
    let config: GatekeeperConfig = toml::from_str(raw)?;
    validate(&config)?;
    Ok(config)
}

fn unique<'a>(kind: &str, names: impl Iterator<Item = &'a str>) -> ServerResult<HashSet<&'a str>> {
    let mut seen = HashSet::new();
    for name in names {
        if name.is_empty() {
            return Err(ServerError::invalid_config(format!("{kind} with empty name")));
        }
        if !seen.insert(name) {
            return Err(ServerError::invalid_config(format!("duplicate {kind} '{name}'")));
        }
    }
    Ok(seen)
}

pub fn validate(config: &GatekeeperConfig) -> ServerResult<()> {
    if let Some(level) = &config.server.log_level
        && !LEVEL_NAMES.contains(&level.to_lowercase().as_str())
    {
        return Err(ServerError::invalid_config(format!(
            "server.log_level '{level}' must be one of {}",
            LEVEL_NAMES.join(", ")
        )));
    }
    if config.proxy.connect_timeout_secs == 0 {
        return Err(ServerError::invalid_config("proxy.connect_timeout_secs must be greater than zero"));
    }
    if config.proxy.progress_timeout_secs == 0 {
        return Err(ServerError::invalid_config("proxy.progress_timeout_secs must be greater than zero"));
    }

    let users = unique("user", config.users.iter().map(|u| u.name.as_str()))?;
    let targets = unique("target", config.targets.iter().map(|t| t.name.as_str()))?;
    let accounts = unique("account", config.accounts.iter().map(|a| a.name.as_str()))?;

    for user in &config.users {
        PasswordHash::new(&user.password_hash)
            .map_err(|e| ServerError::invalid_config(format!("user '{}' has an invalid password_hash: {e}", user.name)))?;
    }

    for target in &config.targets {
        if target.address.is_empty() {
            return Err(ServerError::invalid_config(format!("target '{}' has no address", target.name)));
        }
        if let Some(account) = &target.default_account
            && !accounts.contains(account.as_str())
        {
            return Err(ServerError::invalid_config(format!(
                "target '{}' has unknown default_account '{account}'",
                target.name
            )));
        }
    }

    for account in &config.accounts {
        if account.password.is_some() && account.private_key.is_some() {
            return Err(ServerError::invalid_config(format!(
                "account '{}' sets both password and private_key",
                account.name
            )));
        }
        if account.key_passphrase.is_some() && account.private_key.is_none() {
            return Err(ServerError::invalid_config(format!(
                "account '{}' sets key_passphrase without private_key",
                account.name
            )));
        }
    }

    for grant in &config.grants {
        if !users.contains(grant.user.as_str()) {
            return Err(ServerError::invalid_config(format!("grant references unknown user '{}'", grant.user)));
        }
        if !targets.contains(grant.target.as_str()) {
            return Err(ServerError::invalid_config(format!("grant references unknown target '{}'", grant.target)));
        }
        if let Some(missing) = grant.accounts.iter().find(|a| !accounts.contains(a.as_str())) {
            return Err(ServerError::invalid_config(format!("grant references unknown account '{missing}'")));
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
