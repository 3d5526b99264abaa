//! Tracing subscriber setup for binaries and tests built on this crate.
//!
//! The filter comes from `RUST_LOG`, falling back to [`DEFAULT_FILTER`].

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::{RagError, Result};

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "faq_rag=info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install a human-readable fmt subscriber.
///
/// # Errors
///
/// Returns [`RagError::ConfigError`] if a global subscriber is already set.
pub fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .map_err(|e| RagError::ConfigError(format!("failed to install tracing subscriber: {e}")))
}

/// Install a JSON fmt subscriber, one event per line.
///
/// # Errors
///
/// Returns [`RagError::ConfigError`] if a global subscriber is already set.
pub fn init_json_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
        .try_init()
        .map_err(|e| RagError::ConfigError(format!("failed to install tracing subscriber: {e}")))
}
