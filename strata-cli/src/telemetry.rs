//! Logging setup.

use tracing_subscriber::EnvFilter;

use crate::LogFormat;

/// Install the global subscriber. Logs go to stderr so `--json` output on
/// stdout stays machine-readable. `RUST_LOG` overrides the `info` default.
pub fn init(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);

    let installed = match format {
        LogFormat::Text => builder.with_target(false).try_init(),
        LogFormat::Json => builder.json().with_current_span(false).try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("failed to initialise logging: {e}"))
}
