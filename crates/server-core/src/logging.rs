//! Tracing setup with a runtime-adjustable level.
//!
//! `RUST_LOG` always wins: when it is set, the configured level is ignored both at startup
//! and by [`set_level`].

use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, reload, util::SubscriberInitExt};

pub const LEVEL_NAMES: &[&str] = &["error", "warn", "info", "debug", "trace", "off"];

static RELOAD: OnceCell<reload::Handle<EnvFilter, Registry>> = OnceCell::new();

pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "error" => LevelFilter::ERROR,
        "warn" => LevelFilter::WARN,
        "info" => LevelFilter::INFO,
        "debug" => LevelFilter::DEBUG,
        "trace" => LevelFilter::TRACE,
        "off" => LevelFilter::OFF,
        _ => LevelFilter::INFO,
    }
}

fn level_to_str(level: LevelFilter) -> &'static str {
    match level {
        LevelFilter::ERROR => "error",
        LevelFilter::WARN => "warn",
        LevelFilter::DEBUG => "debug",
        LevelFilter::TRACE => "trace",
        LevelFilter::OFF => "off",
        _ => "info",
    }
}

fn rust_log_set() -> bool {
    matches!(std::env::var("RUST_LOG"), Ok(s) if !s.trim().is_empty())
}

/// Install the global subscriber. Safe to call more than once; later calls are no-ops.
pub fn init_tracing(default_level: LevelFilter) {
    let filter = if rust_log_set() {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_to_str(default_level)))
    } else {
        EnvFilter::new(level_to_str(default_level))
    };
    let (filter, handle) = reload::Layer::new(filter);
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init();
    if installed.is_ok() {
        let _ = RELOAD.set(handle);
    }
}

/// Change the active level. Returns false when `RUST_LOG` pins the filter or tracing is not initialised.
pub fn set_level(level: LevelFilter) -> bool {
    if rust_log_set() {
        return false;
    }
    match RELOAD.get() {
        Some(handle) => handle.reload(EnvFilter::new(level_to_str(level))).is_ok(),
        None => false,
    }
}
