//! Tracing subscriber setup. Logs go to stderr; stdout carries answers.

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber.
///
/// `log_level` overrides `RUST_LOG`; with neither set only warnings and
/// errors are shown. Color is off when `no_color` is set, when `NO_COLOR`
/// is present, or when stderr is not a terminal.
pub fn init_logging(log_level: Option<&str>, no_color: bool) -> Result<()> {
    let env_filter = filter_for(log_level)?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(!no_color && supports_color());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to init logging: {}", e))
}

fn filter_for(log_level: Option<&str>) -> Result<EnvFilter> {
    let default_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string());
    let filter_str = log_level.unwrap_or(&default_level);
    EnvFilter::try_new(filter_str).map_err(|e| anyhow!("Invalid log filter '{}': {}", filter_str, e))
}

fn supports_color() -> bool {
    std::env::var_os("NO_COLOR").is_none() && atty::is(atty::Stream::Stderr)
}
