//! Diagnostic output on stderr.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_DIRECTIVE: &str = "dossier=warn";

/// Pick the log filter: `RUST_LOG` first, then the settings value, then the
/// built in default.
pub fn filter(settings_directive: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .ok()
        .or_else(|| settings_directive.and_then(|d| EnvFilter::try_new(d).ok()))
        .unwrap_or_else(|| DEFAULT_DIRECTIVE.into())
}

/// Install the global subscriber. Later calls are ignored.
pub fn init(settings_directive: Option<&str>) {
    let _ = tracing_subscriber::registry()
        .with(filter(settings_directive))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}
