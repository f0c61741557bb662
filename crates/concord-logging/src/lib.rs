//! Tracing setup shared by Concord binaries and integration tests.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "concord=info";

/// Initialize the global subscriber: `RUST_LOG` if set, otherwise
/// [`DEFAULT_FILTER`], with the standard fmt layer.
///
/// Panics if a global subscriber is already installed; use
/// [`try_init`] where that is not an error.
pub fn init() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Like [`init`], but quietly keeps an already-installed subscriber.
///
/// Integration tests call this from every test body; only the first call
/// installs anything.
pub fn try_init() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
