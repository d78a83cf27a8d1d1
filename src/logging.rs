use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{Error, Result};

/// Installs the global `tracing` subscriber. Output goes to stderr so it
/// never mixes with reports on stdout.
pub fn init_logging(level: &str) -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_new(level)
                .map_err(|e| Error::Logging(format!("Invalid log level: {e}")))?,
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .map_err(|_| Error::Logging("Logging already initialized".into()))
}
