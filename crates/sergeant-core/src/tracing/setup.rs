//! Tracing initialization and configuration.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Environment variable holding per-crate log directives.
pub const LOG_ENV_VAR: &str = "DRILL_SERGEANT_LOG";

const DEFAULT_DIRECTIVES: &str = "sergeant_core=info,sergeant_analysis=info,sergeant_storage=info";

/// Initialize the drill-sergeant tracing/logging system.
///
/// Reads `DRILL_SERGEANT_LOG` for per-crate log levels, e.g.
/// `DRILL_SERGEANT_LOG=sergeant_analysis=debug,sergeant_storage=warn`.
/// Falls back to info for the three workspace crates when unset or invalid.
///
/// Idempotent; later calls are no-ops.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

        // A subscriber installed by the host process takes precedence.
        let installed = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(filter)
            .try_init();
        if let Err(e) = installed {
            tracing::debug!(error = %e, "keeping existing tracing subscriber");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
        tracing::info!("tracing initialized twice without panicking");
    }
}
