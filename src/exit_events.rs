use crate::append_shutdown_log;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitSignal {
    Interrupt,
    Terminate,
}

impl ExitSignal {
    pub fn as_str(self) -> &'static str {
        match self {
            ExitSignal::Interrupt => "interrupt",
            ExitSignal::Terminate => "terminate",
        }
    }
}

/// Resolves on the first interrupt or terminate signal.
///
/// A handler that cannot be installed never fires; the other one still does.
pub async fn shutdown_signal() -> ExitSignal {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!(%error, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::warn!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal = tokio::select! {
        _ = ctrl_c => ExitSignal::Interrupt,
        _ = terminate => ExitSignal::Terminate,
    };

    append_shutdown_log(&format!("{} signal received", signal.as_str()));
    signal
}
