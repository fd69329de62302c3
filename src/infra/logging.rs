//! Tracing subscriber setup for the binary. The library only emits events.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Install a stderr `fmt` subscriber. `RUST_LOG` wins over `default_filter`;
/// `--quiet` drops everything below warnings.
pub fn init(default_filter: &str, quiet: bool, no_color: bool) -> Result<()> {
    let fallback = if quiet { "warn" } else { default_filter };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("install tracing subscriber: {e}"))
}
