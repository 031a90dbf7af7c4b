use crate::config::AppConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Target used for per-request trace spans; muted unless `enable_tracing` is set.
pub const RPC_TRACE_TARGET: &str = "payme_rpc";

/// Crates whose per-query / per-connection chatter is capped at `warn`
const NOISY_TARGETS: &[&str] = &["sqlx", "hyper", "reqwest"];

/// Install the global subscriber. The returned guard must outlive the process
/// so buffered log lines are flushed on shutdown.
pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(rolling_appender(config));
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(config)));
    let registry = tracing_subscriber::registry().with(filter);

    if config.use_json {
        // Target kept so RPC traces can be queried by `payme_rpc`
        registry
            .with(fmt::layer().json().with_target(true).with_writer(writer).with_ansi(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(writer).with_ansi(false))
            .with(fmt::layer().with_target(false).with_ansi(true))
            .init();
    }

    guard
}

fn rolling_appender(config: &AppConfig) -> RollingFileAppender {
    let rotation = match config.rotation.as_str() {
        "hourly" => Rotation::HOURLY,
        "daily" => Rotation::DAILY,
        _ => Rotation::NEVER,
    };
    RollingFileAppender::new(rotation, &config.log_dir, &config.log_file)
}

fn filter_directive(config: &AppConfig) -> String {
    let mut directive = config.log_level.clone();
    for target in NOISY_TARGETS {
        directive.push_str(&format!(",{}=warn", target));
    }
    if !config.enable_tracing {
        directive.push_str(&format!(",{}=off", RPC_TRACE_TARGET));
    }
    directive
}
