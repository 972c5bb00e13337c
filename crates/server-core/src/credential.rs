//! Populating an account's secret before connecting.
//!
//! Stored secrets come from the [`AuthorizationService`]; when none is stored the user is asked
//! for a password over their own terminal.

use std::sync::Arc;

use gk_types::{AccountDescriptor, AccountSecret};
use tracing::{debug, warn};

use crate::{
    authz::AuthorizationService,
    client::{ClientChannel, PromptLine},
    error::ServerResult,
};

pub struct CredentialResolver {
    authz: Arc<dyn AuthorizationService>,
}

impl CredentialResolver {
    pub fn new(authz: Arc<dyn AuthorizationService>) -> Self {
        Self { authz }
    }

    /// Stored secret for `account`. Lookup failures are logged and treated as "nothing stored".
    pub async fn lookup_stored(&self, account: &AccountDescriptor) -> Option<AccountSecret> {
        match self.authz.account_secret(account).await {
            Ok(secret) => secret,
            Err(err) => {
                warn!(account = %account.name, error = %err, "stored secret lookup failed; falling back to prompt");
                None
            }
        }
    }

    pub async fn prompt_password(client: &dyn ClientChannel, account: &AccountDescriptor) -> ServerResult<PromptLine> {
        let prompt = format!("{}'s password: ", account.username);
        client.read_line(&prompt, false).await
    }

    /// Fill in the account secret unless it is already set. An empty answer is kept as an empty password.
    ///
    /// Returns any input typed after the password, to be replayed to the target once connected.
    pub async fn resolve(&self, client: &dyn ClientChannel, account: &mut AccountDescriptor) -> ServerResult<Vec<u8>> {
        if account.has_secret() {
            return Ok(Vec::new());
        }
        let (secret, typeahead) = match self.lookup_stored(account).await {
            Some(secret) => {
                debug!(account = %account.name, kind = secret.kind(), "using stored secret");
                (secret, Vec::new())
            }
            None => {
                let answer = Self::prompt_password(client, account).await?;
                (AccountSecret::password(answer.line), answer.typeahead)
            }
        };
        if account.set_secret(secret).is_err() {
            debug!(account = %account.name, "secret already populated");
        }
        Ok(typeahead)
    }
}
