use std::sync::Arc;

use gk_types::LoginTarget;
use tracing::info;

use super::client::SshClientChannel;
use crate::{
    authz::{ConfigDirectory, PermittedTarget},
    client::ClientChannel,
    format::{CRLF, warning_line},
    proxy::{ProxyContext, ProxyOutcome, ProxyServer},
    sessions::SessionSummary,
};

/// Listing shown when a user logs in without naming a target.
pub fn render_target_list(user: &str, targets: &[PermittedTarget], active: &[SessionSummary]) -> String {
    let mut out = if targets.is_empty() {
        format!("No targets are available for {user}.{CRLF}")
    } else {
        let mut out = format!("Targets available for {user}:{CRLF}");
        for t in targets {
            out.push_str(&format!("  {:<24} {}{CRLF}", t.target, t.accounts.join(", ")));
        }
        out.push_str(&format!("Log in as {user}:<account>@<target> to connect.{CRLF}"));
        out
    };
    if !active.is_empty() {
        out.push_str(&format!("Active sessions:{CRLF}"));
        for s in active {
            out.push_str(&format!(
                "  #{:<4} {}@{} since {}{CRLF}",
                s.session_number,
                s.account,
                s.target,
                s.started_at.format("%Y-%m-%d %H:%M:%S UTC")
            ));
        }
    }
    out
}

/// Serve one shell request and return the exit status reported to the client.
pub(super) async fn run_login(
    ctx: Arc<ProxyContext>,
    directory: Arc<ConfigDirectory>,
    login: LoginTarget,
    client: Arc<SshClientChannel>,
) -> u32 {
    let Some(target_name) = login.target.as_deref() else {
        let active = ctx.registry.list_for_user(&login.username).await;
        let listing = render_target_list(&login.username, &directory.permitted_targets(&login.username), &active);
        let _ = client.send_text(&listing).await;
        return 0;
    };

    let resolved = directory
        .target(target_name)
        .and_then(|target| Ok((directory.account_for(&target.name, login.account.as_deref())?, target)));
    let (account, target) = match resolved {
        Ok(pair) => pair,
        Err(err) => {
            info!(user = %login.username, target_name, error = %err, "login target rejected");
            let _ = client.send_text(&warning_line(&err.to_string())).await;
            let _ = client.send_text(CRLF).await;
            return 1;
        }
    };

    let outcome = ProxyServer::new(ctx, client).proxy(target, account).await;
    match outcome {
        ProxyOutcome::Completed { .. } => 0,
        _ => 1,
    }
}
