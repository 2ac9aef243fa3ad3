//! textrec-cli
//!
//! Shared pieces of the `textrec-build`, `textrec-query` and `textrec-server`
//! binaries: tracing setup and the HTTP API served by `textrec-server`.

pub mod api;

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` wins; otherwise `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // a second call (tests spawning several servers) is harmless
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}
