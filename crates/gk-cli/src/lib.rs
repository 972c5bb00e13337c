pub mod server_cli;

use gk_types::config::GatekeeperConfig;
use server_core::logging::{self, parse_level};
use tracing::{debug, level_filters::LevelFilter};

use crate::server_cli::ServerArgs;

/// Install the global subscriber. `RUST_LOG` takes precedence over `level`.
pub fn init_tracing(level: Option<&str>) {
    logging::init_tracing(level.map(parse_level).unwrap_or(LevelFilter::INFO));
}

/// Apply the level from the flag or config to the running subscriber. Returns false when
/// neither names a level, `RUST_LOG` pins the filter or tracing is not installed.
pub fn apply_log_level(args: &ServerArgs, config: &GatekeeperConfig) -> bool {
    let Some(level) = args.effective_log_level(config) else {
        return false;
    };
    let applied = logging::set_level(parse_level(&level));
    debug!(log_level = %level, applied, "log level applied");
    applied
}
