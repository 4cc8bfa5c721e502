//! Shared plumbing for the `arxmap` and `arxmap-serve` binaries.

pub mod artifacts;
pub mod pipeline;
pub mod serve;

use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins; otherwise `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}
