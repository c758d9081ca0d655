use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::progress::BarAwareStderr;

/// Install the global subscriber: stderr always, plus `log_file` when given.
///
/// Level defaults to `info` and follows `RUST_LOG`. Keep the returned guard alive
/// until exit or buffered file lines are lost.
pub fn init_logging(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = fmt::layer().with_writer(|| BarAwareStderr);

    let (file, guard) = match log_file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(file_appender(path)?);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    Registry::default()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()?;
    Ok(guard)
}

/// Appends to `path` across runs, creating its directory if needed.
fn file_appender(path: &Path) -> Result<RollingFileAppender> {
    let name = path
        .file_name()
        .with_context(|| format!("invalid log file {path:?}"))?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name.to_string_lossy())
        .build(dir)
        .with_context(|| format!("unable to open log file {path:?}"))
}
