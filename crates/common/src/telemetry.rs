//! Process-wide `tracing` subscriber setup.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{Error, Result};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `level`. When `json` is set, records are
/// emitted as one JSON object per line. Returns an error if a global
/// subscriber is already installed; callers that may initialise more than
/// once can ignore it.
pub fn init_telemetry(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if json {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .try_init()
    };

    installed.map_err(|e| Error::external("failed to install tracing subscriber", e))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_reports_error_instead_of_panicking() {
        let _ = init_telemetry("debug", false);
        assert!(init_telemetry("debug", true).is_err());
    }
}
