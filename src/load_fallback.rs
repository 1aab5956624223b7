use std::path::PathBuf;

use crate::{
    diagnostic_page::DiagnosticPage,
    window_content::{network_url, WindowLoadTarget},
    StartupError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadFailureReason {
    ConnectionRefused,
    AssetMissing,
    Other(String),
}

impl std::fmt::Display for LoadFailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectionRefused => f.write_str("connection refused"),
            Self::AssetMissing => f.write_str("asset missing"),
            Self::Other(reason) => f.write_str(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    pub target: WindowLoadTarget,
    pub reason: LoadFailureReason,
}

/// Next step for the window after a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackAction {
    Load(WindowLoadTarget),
    ShowDiagnostic(DiagnosticPage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChainState {
    Primary,
    FallbackAttempted,
    Terminated,
}

/// Per-session recovery policy: at most one static fallback, then a diagnostic page.
///
/// Once the diagnostic has been issued every further event yields `None`.
#[derive(Debug)]
pub struct LoadFallbackChain {
    state: ChainState,
}

impl Default for LoadFallbackChain {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadFallbackChain {
    pub fn new() -> Self {
        Self {
            state: ChainState::Primary,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.state == ChainState::Terminated
    }

    pub fn fallback_attempted(&self) -> bool {
        self.state != ChainState::Primary
    }

    fn terminate(&mut self, page: DiagnosticPage) -> Option<FallbackAction> {
        self.state = ChainState::Terminated;
        tracing::warn!(title = %page.title, "showing diagnostic page");
        Some(FallbackAction::ShowDiagnostic(page))
    }

    fn try_static_fallback<F>(&mut self, resolve_static: F) -> Option<FallbackAction>
    where
        F: FnOnce() -> Result<WindowLoadTarget, StartupError>,
    {
        self.state = ChainState::FallbackAttempted;
        match resolve_static() {
            Ok(target) => {
                tracing::info!(load_target = %target, "falling back to static assets");
                Some(FallbackAction::Load(target))
            }
            Err(StartupError::AssetNotFound { attempted }) => {
                self.terminate(DiagnosticPage::packaged_assets_missing(&attempted))
            }
            Err(error) => {
                tracing::warn!(%error, "static fallback resolution failed");
                self.terminate(DiagnosticPage::packaged_assets_missing(&[]))
            }
        }
    }

    pub fn on_load_failure<F>(
        &mut self,
        failure: &LoadFailure,
        resolve_static: F,
    ) -> Option<FallbackAction>
    where
        F: FnOnce() -> Result<WindowLoadTarget, StartupError>,
    {
        if self.is_terminated() {
            return None;
        }
        tracing::warn!(
            load_target = %failure.target,
            reason = %failure.reason,
            "window load failed"
        );

        match &failure.target {
            WindowLoadTarget::Network { port } => {
                if failure.reason == LoadFailureReason::ConnectionRefused
                    && self.state == ChainState::Primary
                {
                    return self.try_static_fallback(resolve_static);
                }
                self.terminate(DiagnosticPage::backend_unreachable(
                    &network_url(*port),
                    &failure.reason.to_string(),
                ))
            }
            WindowLoadTarget::StaticAsset { index_path, .. } => {
                self.terminate(DiagnosticPage::packaged_assets_missing(std::slice::from_ref(
                    index_path,
                )))
            }
        }
    }

    /// A readiness timeout counts as a refused primary load; no network load is attempted.
    pub fn on_readiness_timeout<F>(
        &mut self,
        error: &StartupError,
        resolve_static: F,
    ) -> Option<FallbackAction>
    where
        F: FnOnce() -> Result<WindowLoadTarget, StartupError>,
    {
        if self.is_terminated() {
            return None;
        }
        tracing::warn!(%error, "backend not ready, trying static assets");
        if self.state == ChainState::Primary {
            return self.try_static_fallback(resolve_static);
        }
        self.terminate(DiagnosticPage::packaged_assets_missing(&[]))
    }

    pub fn on_static_assets_missing(&mut self, attempted: &[PathBuf]) -> Option<FallbackAction> {
        if self.is_terminated() {
            return None;
        }
        self.terminate(DiagnosticPage::packaged_assets_missing(attempted))
    }
}
