//! # Tracing Setup

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info,otop=debug,sqlx=warn";

/// Initializes the tracing subscriber for logging.
///
/// ## Log Levels
/// - Set `RUST_LOG=debug` for verbose output
/// - Set `RUST_LOG=otop_engine=trace` for detailed engine logs
/// - Default: `info,otop=debug,sqlx=warn`
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
