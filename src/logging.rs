use tracing::Subscriber;
use tracing_subscriber::{
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::config::LoggingConfig;

/// `--debug` wins over `RUST_LOG`, which wins over the configured level.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::new(filter_directive(config, std::env::var(EnvFilter::DEFAULT_ENV).ok()))
}

fn filter_directive(config: &LoggingConfig, rust_log: Option<String>) -> String {
    if config.debug {
        return "debug".into();
    }
    rust_log
        .filter(|directive| !directive.trim().is_empty())
        .unwrap_or_else(|| config.level.clone())
}

/// JSON records with event fields merged into the root object.
pub fn json_layer<S, W>(make_writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(false)
        .flatten_event(true)
        .with_writer(make_writer)
}

/// Sets up the global subscriber. Logs go to stderr so stdout stays free
/// for the metric stream. Calling this twice is a no-op.
pub fn init_logger(config: &LoggingConfig) {
    let registry = tracing_subscriber::registry().with(env_filter(config));

    let result = match config.format.as_str() {
        "compact" => registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init(),
        _ => registry.with(json_layer(std::io::stderr)).try_init(),
    };

    if let Err(err) = result {
        eprintln!("logger already initialised: {}", err);
    }
}
