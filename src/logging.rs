//! Logging and tracing setup.
//!
//! All logs are written to **stderr**. The filter is read from
//! `PARTNER_CENTER_SELL_LOG` first and `RUST_LOG` second, so the provider's
//! verbosity can be raised without touching the host process.
//!
//! ```bash
//! # Debug output for the provider only
//! PARTNER_CENTER_SELL_LOG=partner_center_sell_provider=debug ./my-host
//!
//! # Everything at trace
//! RUST_LOG=trace ./my-host
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable consulted before `RUST_LOG`.
pub const LOG_ENV_VAR: &str = "PARTNER_CENTER_SELL_LOG";

/// Initialize the default logging subscriber at `info`.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Initialize logging with a custom default level.
///
/// The default only applies when neither [`LOG_ENV_VAR`] nor `RUST_LOG` is set.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(stderr_layer())
        .init();
}

/// Try to initialize logging, returning false if already initialized.
///
/// Useful in tests, where several cases may race to install a subscriber.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(env_filter("info"))
        .with(stderr_layer())
        .try_init()
        .is_ok()
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

#[cfg(test)]
mod tests {
    // The global subscriber can only be set once per process, so only
    // filter parsing is covered here.

    use super::*;

    #[test]
    fn test_env_filter_parsing() {
        assert!(EnvFilter::try_new("info").is_ok());
        assert!(EnvFilter::try_new("partner_center_sell_provider=debug").is_ok());
        assert!(EnvFilter::try_new("warn,partner_center_sell_provider::patch=trace").is_ok());
    }

    #[test]
    fn test_default_filter_builds() {
        let filter = env_filter("debug");
        assert!(!filter.to_string().is_empty());
    }
}
