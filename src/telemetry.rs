//! Logging setup.

use tracing_subscriber::EnvFilter;

/// Tracing configuration.
#[derive(Clone, Debug)]
pub struct TracingConfig {
    /// Log level filter (e.g. "info", "podium=debug,tower_http=warn").
    pub log_level: String,
    /// Output logs as JSON (useful for log aggregation).
    pub json_output: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            json_output: false,
        }
    }
}

/// Initializes the global tracing subscriber. `RUST_LOG` overrides the
/// configured level. Calling it again is a no-op.
pub fn init_tracing(config: &TracingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    if config.json_output {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}
