//! Tracing setup for embedders and tests

use tracing::Level;

/// Installs a `fmt` subscriber at `level`. Returns `false` if a global
/// subscriber was already set, which makes repeated calls harmless.
pub fn init_tracing(level: Level) -> bool {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .is_ok()
}
