use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::{bail, Context, Result};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};
use vigil_core::api::LoggingConfig;

// Flushes buffered file output on exit
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber. `RUST_LOG` takes precedence over
/// `logging.level`.
pub fn init(logging: &LoggingConfig) -> Result<()> {
    if !logging.enabled {
        return Ok(());
    }
    if !logging.console && !logging.file {
        bail!("logging is enabled but both console and file output are off");
    }

    let file_writer = if logging.file {
        Some(file_writer(logging)?)
    } else {
        None
    };

    let stderr = logging.console.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(atty::is(atty::Stream::Stderr))
    });
    let file = file_writer.map(|writer| fmt::layer().with_writer(writer).with_ansi(false));

    tracing_subscriber::registry()
        .with(env_filter(&logging.level)?)
        .with(stderr)
        .with(file)
        .init();
    Ok(())
}

fn env_filter(level: &str) -> Result<EnvFilter> {
    let from_env = std::env::var("RUST_LOG").is_ok_and(|v| !v.trim().is_empty());
    if from_env {
        return Ok(EnvFilter::from_default_env());
    }
    EnvFilter::try_new(level).with_context(|| format!("invalid log level '{level}'"))
}

/// One log file per process under the configured directory.
fn file_writer(logging: &LoggingConfig) -> Result<NonBlocking> {
    let dir = log_dir(logging.directory.as_deref());
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("create log dir {}", dir.display()))?;

    let file_name = format!("vigil.{}.log", std::process::id());
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(
        dir, file_name,
    ));
    let _ = FILE_GUARD.set(guard);
    Ok(writer)
}

fn log_dir(configured: Option<&str>) -> PathBuf {
    configured
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("vigil"))
}
