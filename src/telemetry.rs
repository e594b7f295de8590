//! Logging setup
//!
//! The library only emits `tracing` events. Hosts that have no subscriber of
//! their own can install a formatted one here; `RUST_LOG` overrides the
//! default directive.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVE: &str = "trueno_guard=info";

/// Install a global fmt subscriber.
///
/// Returns `false` if a global subscriber was already installed (the call is
/// then a no-op), so it is safe to call from every test or entry point.
#[must_use = "false means another subscriber is already installed"]
pub fn init_tracing(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
