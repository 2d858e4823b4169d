use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

use crate::LogLevel;

/// Installs the global subscriber. Logs go to stderr so they never mix with
/// diagnostics printed on stdout.
pub fn init_logging(level: LogLevel, json: bool) {
    let filter = build_filter(level);
    let subscriber = tracing_subscriber::registry().with(filter);

    let result = if json {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
    };

    if let Err(err) = result {
        eprintln!("modscope: could not install logger: {err}");
    }
}

fn build_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::from_default_env().add_directive(level.as_tracing_level().into())
}
