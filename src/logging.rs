//! Diagnostic logging for the `sink` binary.
//!
//! Events go to stderr so that JSON written to stdout stays parseable.

use std::env;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding a filter directive for sink only.
pub const LOG_ENV: &str = "SINK_LOG";

const DEFAULT_DIRECTIVE: &str = "warn";

/// Install the stderr subscriber.
///
/// Precedence: `-v`/`-vv`, then `SINK_LOG`, then `RUST_LOG`, then `warn`.
pub fn init(verbosity: u8) {
    let directive = directive(
        verbosity,
        env::var(LOG_ENV).ok(),
        env::var(EnvFilter::DEFAULT_ENV).ok(),
    );
    let filter =
        EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbosity > 1);

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init();
}

fn directive(verbosity: u8, sink_log: Option<String>, rust_log: Option<String>) -> String {
    match verbosity {
        0 => sink_log
            .into_iter()
            .chain(rust_log)
            .find(|d| !d.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DIRECTIVE.to_string()),
        1 => "info".to_string(),
        _ => "debug".to_string(),
    }
}
