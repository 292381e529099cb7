//! Logging setup for the handle layer
//!
//! Uses `tracing` for structured events (retains, releases, error slot
//! activity). Embedders that already install their own subscriber can
//! skip this module entirely.

use once_cell::sync::OnceCell;

static INIT: OnceCell<()> = OnceCell::new();

/// Install a compact `tracing` subscriber for the process.
///
/// The filter comes from the `TETHER_LOG` environment variable, falling
/// back to `tether_sdk=info`. Calling more than once is harmless.
pub fn init() {
    INIT.get_or_init(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_env("TETHER_LOG")
            .unwrap_or_else(|_| EnvFilter::new("tether_sdk=info"));

        fmt()
            .with_env_filter(filter)
            .compact()
            .try_init()
            .ok();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init();
        init();
    }
}
