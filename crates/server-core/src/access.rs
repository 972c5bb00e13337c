use std::sync::Arc;

use gk_types::{AccountDescriptor, Identity, TargetDescriptor};
use tracing::error;

use crate::authz::AuthorizationService;

/// Yes/no access decision, taken before any network activity.
pub struct AccessGate {
    authz: Arc<dyn AuthorizationService>,
}

impl AccessGate {
    pub fn new(authz: Arc<dyn AuthorizationService>) -> Self {
        Self { authz }
    }

    /// Authorization errors deny access.
    pub async fn allowed(&self, identity: &Identity, target: &TargetDescriptor, account: &AccountDescriptor) -> bool {
        match self.authz.check_permission(identity, target, account).await {
            Ok(allowed) => allowed,
            Err(err) => {
                error!(user = %identity, target_name = %target.name, account = %account.name, error = %err, "permission check failed");
                false
            }
        }
    }
}
