//! Test logging bootstrap.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "RIGOR_LOG";

/// Installs a fmt subscriber that writes through the test harness capture.
///
/// The filter is read from `RIGOR_LOG` (e.g. `rigor_db=debug`) and falls back
/// to `warn`. Safe to call from every test: only the first call installs.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_test_logging();
        init_test_logging();
        tracing::debug!("logging initialized twice");
    }
}
