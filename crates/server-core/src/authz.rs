//! Authorization service boundary and the config-backed directory implementing it.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use gk_types::{
    AccountDescriptor, AccountSecret, Identity, TargetDescriptor,
    config::{AccountEntry, GatekeeperConfig},
};

use crate::error::{ServerError, ServerResult};

/// Owner of stored account secrets and of the access policy.
#[async_trait]
pub trait AuthorizationService: Send + Sync {
    /// Stored secret for `account`, if one exists.
    async fn account_secret(&self, account: &AccountDescriptor) -> ServerResult<Option<AccountSecret>>;

    /// Whether `identity` may use `account` on `target`.
    async fn check_permission(&self, identity: &Identity, target: &TargetDescriptor, account: &AccountDescriptor) -> ServerResult<bool>;
}

/// A target the user may reach, and the accounts they may use there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermittedTarget {
    pub target: String,
    pub accounts: Vec<String>,
}

/// Users, targets, accounts and grants loaded from the config file.
pub struct ConfigDirectory {
    users: HashMap<String, String>,
    targets: HashMap<String, TargetEntryView>,
    accounts: HashMap<String, AccountEntry>,
    grants: BTreeMap<(String, String), BTreeSet<String>>,
}

struct TargetEntryView {
    descriptor: TargetDescriptor,
    default_account: Option<String>,
}

impl ConfigDirectory {
    pub fn from_config(config: &GatekeeperConfig) -> Self {
        let users = config.users.iter().map(|u| (u.name.clone(), u.password_hash.clone())).collect();
        let targets = config
            .targets
            .iter()
            .map(|t| {
                (
                    t.name.clone(),
                    TargetEntryView {
                        descriptor: TargetDescriptor::from(t),
                        default_account: t.default_account.clone(),
                    },
                )
            })
            .collect();
        let accounts = config.accounts.iter().map(|a| (a.name.clone(), a.clone())).collect();

        let mut grants: BTreeMap<(String, String), BTreeSet<String>> = BTreeMap::new();
        for grant in &config.grants {
            grants
                .entry((grant.user.clone(), grant.target.clone()))
                .or_default()
                .extend(grant.accounts.iter().cloned());
        }

        Self {
            users,
            targets,
            accounts,
            grants,
        }
    }

    pub fn password_hash(&self, user: &str) -> Option<&str> {
        self.users.get(user).map(String::as_str)
    }

    pub fn target(&self, name: &str) -> ServerResult<TargetDescriptor> {
        self.targets
            .get(name)
            .map(|t| t.descriptor.clone())
            .ok_or_else(|| ServerError::not_found("Target", name))
    }

    /// Account descriptor for `account` on `target`, falling back to the target's default account.
    /// The returned descriptor carries no secret yet.
    pub fn account_for(&self, target: &str, account: Option<&str>) -> ServerResult<AccountDescriptor> {
        let name = match account {
            Some(name) => name.to_string(),
            None => self
                .targets
                .get(target)
                .ok_or_else(|| ServerError::not_found("Target", target))?
                .default_account
                .clone()
                .ok_or_else(|| ServerError::Other(format!("Target '{target}' has no default account; use <account>@{target}")))?,
        };
        let entry = self.accounts.get(&name).ok_or_else(|| ServerError::not_found("Account", &name))?;
        Ok(AccountDescriptor::new(entry.name.clone(), entry.login_name()))
    }

    pub fn permitted_targets(&self, user: &str) -> Vec<PermittedTarget> {
        self.grants
            .iter()
            .filter(|((u, t), _)| u == user && self.targets.contains_key(t))
            .map(|((_, t), accounts)| PermittedTarget {
                target: t.clone(),
                accounts: accounts.iter().cloned().collect(),
            })
            .collect()
    }
}

#[async_trait]
impl AuthorizationService for ConfigDirectory {
    async fn account_secret(&self, account: &AccountDescriptor) -> ServerResult<Option<AccountSecret>> {
        let Some(entry) = self.accounts.get(&account.name) else {
            return Err(ServerError::not_found("Account", &account.name));
        };
        let secret = match (&entry.private_key, &entry.password) {
            (Some(key), _) if !key.is_empty() => Some(AccountSecret::private_key(key.clone(), entry.key_passphrase.clone())),
            (_, Some(pw)) if !pw.is_empty() => Some(AccountSecret::password(pw.clone())),
            _ => None,
        };
        Ok(secret)
    }

    async fn check_permission(&self, identity: &Identity, target: &TargetDescriptor, account: &AccountDescriptor) -> ServerResult<bool> {
        Ok(self
            .grants
            .get(&(identity.username.clone(), target.name.clone()))
            .is_some_and(|accounts| accounts.contains(&account.name)))
    }
}
