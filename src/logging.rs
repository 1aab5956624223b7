use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::LOG_FILTER_ENV;

const LOGS_DIR_NAME: &str = "logs";

pub const STARTUP_LOG_TARGET: &str = "wanderagent::startup";
pub const RUNTIME_LOG_TARGET: &str = "wanderagent::runtime";
pub const SHUTDOWN_LOG_TARGET: &str = "wanderagent::shutdown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesktopLogCategory {
    Startup,
    Runtime,
    Shutdown,
}

pub fn append_desktop_log(category: DesktopLogCategory, message: &str) {
    // `target:` must be a constant, hence one arm per category.
    match category {
        DesktopLogCategory::Startup => tracing::info!(target: STARTUP_LOG_TARGET, "{message}"),
        DesktopLogCategory::Runtime => tracing::info!(target: RUNTIME_LOG_TARGET, "{message}"),
        DesktopLogCategory::Shutdown => tracing::info!(target: SHUTDOWN_LOG_TARGET, "{message}"),
    }
}

pub fn resolve_desktop_log_path(
    packaged_root_dir: Option<PathBuf>,
    log_file_name: &str,
) -> PathBuf {
    match packaged_root_dir {
        Some(root) => root.join(LOGS_DIR_NAME).join(log_file_name),
        None => std::env::temp_dir()
            .join(crate::PACKAGED_ROOT_DIR_NAME)
            .join(LOGS_DIR_NAME)
            .join(log_file_name),
    }
}

fn env_filter() -> EnvFilter {
    std::env::var(LOG_FILTER_ENV)
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Installs the global subscriber: stderr plus a daily-rolling file next to `log_path`.
///
/// The returned guard flushes the file writer on drop and must be held until exit. Returns
/// `None` when the file sink is unavailable; stderr logging is still installed then.
pub fn init_logging(log_path: &Path) -> Option<WorkerGuard> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    let file_sink = prepare_log_dir(log_path).map(|(dir, file_name)| {
        let appender = tracing_appender::rolling::daily(dir, file_name);
        tracing_appender::non_blocking(appender)
    });
    let (file_layer, guard) = match file_sink {
        Some((writer, guard)) => (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true)
                    .boxed(),
            ),
            Some(guard),
        ),
        None => (None, None),
    };

    if tracing_subscriber::registry()
        .with(env_filter())
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("global tracing subscriber already initialized, skipping");
    }
    guard
}

fn prepare_log_dir(log_path: &Path) -> Option<(PathBuf, std::ffi::OsString)> {
    let dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_os_string();
    if let Err(error) = std::fs::create_dir_all(dir) {
        eprintln!("failed to create log directory {}: {error}", dir.display());
        return None;
    }
    Some((dir.to_path_buf(), file_name))
}
