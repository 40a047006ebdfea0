//! Logging infrastructure for waypost.
//!
//! Structured console logging for the CLI and any embedding binary,
//! configurable via the `RUST_LOG` environment variable (defaults to
//! `info`). Library code only emits `tracing` events; installing a
//! subscriber is the binary's choice.

use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

/// Initialize the global logging subscriber.
///
/// Respects `RUST_LOG` if set; otherwise logs at `info` and above.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging() -> Result<(), TryInitError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .finish()
        .try_init()
}
