use std::path::PathBuf;
use std::sync::Once;

use tracing::Level;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    Layer,
};

// Log targets, one per stage of the pipeline
pub const SOURCE: &str = "maintab::source";
pub const CLASSIFY: &str = "maintab::classify";
pub const TASK_PASS: &str = "maintab::task_pass";
pub const SPARE_PASS: &str = "maintab::spare_pass";
pub const SINK: &str = "maintab::sink";

const LOG_FILE_NAME: &str = "maintab.log";

static INIT: Once = Once::new();

fn level_for(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn stderr_filter(verbosity: u8) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level_for(verbosity)).into())
        .from_env_lossy()
}

/// Install the global subscriber: a compact stderr layer honouring `RUST_LOG`,
/// raised by `verbosity` (`-v`, `-vv`).
///
/// Calling this more than once is a no-op.
pub fn init_logging(verbosity: u8) {
    INIT.call_once(|| {
        let stderr_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .with_filter(stderr_filter(verbosity));

        tracing_subscriber::registry().with(stderr_layer).init();
    });
}

/// Same as [`init_logging`] but additionally writes every pipeline event, down to
/// `trace`, into `<log_dir>/maintab.log`. The returned guard flushes the file
/// writer on drop and must be held for the lifetime of the process.
pub fn init_logging_with_dir(verbosity: u8, log_dir: PathBuf) -> std::io::Result<WorkerGuard> {
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::NEVER, log_dir, LOG_FILE_NAME);
    let (non_blocking_appender, guard) = tracing_appender::non_blocking(file_appender);

    let file_filter = [SOURCE, CLASSIFY, TASK_PASS, SPARE_PASS, SINK]
        .iter()
        .map(|t| format!("{}=trace", t))
        .collect::<Vec<_>>()
        .join(",");

    INIT.call_once(|| {
        let file_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_ansi(false)
            .with_line_number(true)
            .with_writer(non_blocking_appender)
            .with_filter(EnvFilter::new(file_filter));

        let stderr_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .with_filter(stderr_filter(verbosity));

        tracing_subscriber::registry()
            .with(file_layer)
            .with(stderr_layer)
            .init();
    });

    Ok(guard)
}
