//! Logging and tracing bootstrap.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use bookshelf_kernel::settings::{LogFormat, TelemetrySettings};

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over the configured filter. Calling this more
/// than once keeps the first subscriber.
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<()> {
    let filter = build_filter(settings)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = match settings.log_format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    if installed.is_err() {
        tracing::debug!(target: "bookshelf-telemetry", "global subscriber already installed");
    } else {
        tracing::info!(
            target: "bookshelf-telemetry",
            format = ?settings.log_format,
            "telemetry initialized"
        );
    }

    Ok(())
}

fn build_filter(settings: &TelemetrySettings) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&settings.filter)
            .with_context(|| format!("invalid log filter '{}'", settings.filter)),
    }
}
