use std::io::BufRead;

use anyhow::{Result, bail};
use clap::Parser;
use gk_cli::{
    apply_log_level, init_tracing,
    server_cli::{ServerArgs, ServerSubcommand, summarize},
};
use server_core::{auth::hash_password, run_ssh_server};
use tracing::info;

fn read_password_from_stdin() -> Result<String> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("no password given on stdin");
    }
    Ok(password)
}

/// Re-read the config on SIGHUP and apply its log level.
#[cfg(unix)]
async fn reload_log_level_on_hangup(args: ServerArgs) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};
    use tracing::warn;

    let mut hangups = signal(SignalKind::hangup())?;
    while hangups.recv().await.is_some() {
        match args.load_config() {
            Ok(config) => {
                let applied = apply_log_level(&args, &config);
                info!(applied, "config reloaded on SIGHUP");
            }
            Err(err) => warn!(error = %format!("{err:#}"), "config reload failed; keeping current log level"),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = ServerArgs::parse();
    init_tracing(args.log_level.as_deref());

    match &args.cmd {
        Some(ServerSubcommand::HashPassword { password }) => {
            let password = match password {
                Some(p) => p.clone(),
                None => read_password_from_stdin()?,
            };
            println!("{}", hash_password(&password)?);
        }
        Some(ServerSubcommand::CheckConfig) => {
            let config = args.load_config()?;
            println!("{}", summarize(&config));
        }
        None => {
            let config = args.load_config()?;
            apply_log_level(&args, &config);
            #[cfg(unix)]
            tokio::spawn(reload_log_level_on_hangup(args.clone()));
            tokio::select! {
                res = run_ssh_server(config) => res?,
                _ = tokio::signal::ctrl_c() => info!("received interrupt; shutting down"),
            }
        }
    }
    Ok(())
}
