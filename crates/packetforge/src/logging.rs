//! Tracing setup for binaries built on packetforge.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

/// Installs a console `tracing` subscriber.
///
/// The filter comes from `RUST_LOG` when it is set and valid, otherwise
/// from [`DEFAULT_FILTER`]. Calling this more than once, or after another
/// subscriber was installed, leaves the existing subscriber in place.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_env_filter());
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// The filter [`init_tracing`] falls back to.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}
