//! Log output for the command-line tool.
//!
//! Library code only emits `tracing` events. The binary calls [`init`] once at
//! startup; tests that want to see events can scope a subscriber with
//! `tracing::subscriber::with_default`.

use crate::errors::{Error, Result};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the process-wide subscriber.
///
/// `RUST_LOG` wins when set. Otherwise the level is `debug` with `debug` set
/// and `info` without. Output goes to stderr so the summary on stdout stays
/// machine readable.
pub fn init(debug: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_names(true)
                .compact(),
        )
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))
}

fn default_directive(debug: bool) -> &'static str {
    if debug { "debug" } else { "info" }
}
