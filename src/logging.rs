//! Tracing subscriber setup for binaries and tests embedding the engine.
//!
//! The library only emits `tracing` events; installing a subscriber is the
//! embedding application's call.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "abtest_engine=info";

/// Install a fmt subscriber filtered by `RUST_LOG` (falling back to
/// [`DEFAULT_FILTER`]).
///
/// Returns `false` if a global subscriber was already installed.
pub fn init() -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
