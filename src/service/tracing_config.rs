use dotenv::dotenv;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use super::config::LogConfig;
use super::{AppError, AppResult};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Keeps the non-blocking file writer alive. Dropping it flushes pending
/// log lines.
pub struct TracingGuard {
    _worker_guard: Option<WorkerGuard>,
}

fn env_filter(default_level: &str) -> AppResult<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| AppError::InvalidValue(format!("log level {}: {}", default_level, e)))
}

/// stderr only, for tests. Safe to call more than once.
pub fn setup_local_tracing() -> AppResult<()> {
    dotenv().ok();
    let timer = ChronoLocal::new(TIME_FORMAT.to_string());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(timer)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_writer(std::io::stderr);
    let _ = tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter("debug")?)
        .try_init();
    Ok(())
}

/// Installs the global subscriber.
///
/// stdout carries relayed payload, so console output always goes to stderr.
/// When `log.dir` is set an hourly rolling file is written as well.
pub fn setup_tracing(log_config: &LogConfig) -> AppResult<TracingGuard> {
    dotenv().ok();

    let timer = ChronoLocal::new(TIME_FORMAT.to_string());
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_timer(timer)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_writer(std::io::stderr);

    let (file_layer, worker_guard) = match &log_config.dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::hourly(dir, "framecat.log");
            let (non_blocking, worker_guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
                .with_target(true)
                .with_thread_names(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
                .with_writer(non_blocking);
            (Some(layer), Some(worker_guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .with(env_filter(&log_config.level)?)
        .try_init()
        .map_err(|e| AppError::IllegalStateError(format!("tracing init: {}", e)))?;

    Ok(TracingGuard {
        _worker_guard: worker_guard,
    })
}
