use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogConfig, LogFormat};

const DEFAULT_FILTER: &str = "blink_motors=info,tower_http=info";

/// Install the global tracing subscriber.
///
/// Output goes through a non-blocking writer, to stdout or to a daily rolling
/// file under `LogConfig::directory`. The returned guard flushes buffered
/// lines when dropped, so keep it alive for the life of the process.
pub fn init(config: &LogConfig) -> WorkerGuard {
    let (writer, guard) = match &config.directory {
        Some(dir) => {
            let file = tracing_appender::rolling::daily(dir, "blink_motors.log");
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(std::io::stdout()),
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Json => registry.with(fmt::layer().json().with_writer(writer)).init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_ansi(config.directory.is_none()).with_writer(writer))
            .init(),
    }

    guard
}
