//! Process-wide logging setup.
//!
//! Library code only emits `tracing` events; installing a subscriber is left to the binary.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs a stderr subscriber. `RUST_LOG` wins over `default_level` when set.
pub fn init_tracing(default_level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_to_filter_str(default_level)));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

fn level_to_filter_str(level: Level) -> String {
    level.as_str().to_ascii_lowercase()
}

#[cfg(test)]
pub(crate) fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_maps_to_filter_directive() {
        assert_eq!(level_to_filter_str(Level::DEBUG), "debug");
        assert_eq!(level_to_filter_str(Level::WARN), "warn");
    }
}
