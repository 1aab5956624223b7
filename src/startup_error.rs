use std::{io, path::PathBuf, time::Duration};

use thiserror::Error;

/// Failures raised while bringing the desktop host from cold start to a loaded window.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("no backend entry or standalone server executable found; tried: {}", format_paths(.attempted))]
    EntryNotFound { attempted: Vec<PathBuf> },

    #[error("failed to spawn backend process {command:?}: {source}")]
    ProcessSpawnFailure {
        command: Vec<String>,
        #[source]
        source: io::Error,
    },

    #[error("backend did not accept connections on port {port} within {}ms", .timeout.as_millis())]
    ReadinessTimeout { port: u16, timeout: Duration },

    #[error("failed to write module shim file {}: {source}", .path.display())]
    ShimWriteFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("static index asset not found; tried: {}", format_paths(.attempted))]
    AssetNotFound { attempted: Vec<PathBuf> },

    #[error("invalid backend launch configuration: {0}")]
    InvalidLaunchConfig(String),

    #[error("desktop host startup is already in progress")]
    AlreadyStarting,
}

impl StartupError {
    /// Fatal errors end startup with a non-zero exit; the rest feed the fallback chain.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            StartupError::ReadinessTimeout { .. }
                | StartupError::AssetNotFound { .. }
                | StartupError::AlreadyStarting
        )
    }
}

fn format_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "<none>".to_string();
    }
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
