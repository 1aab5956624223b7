use std::{path::PathBuf, time::Duration};

use crate::{
    app_types::AtomicFlagGuard,
    backend_readiness::{probe_once, ProbeOutcome, ReadinessProbe},
    diagnostic_page::DiagnosticPage,
    entry_shim::{prepare_entry_shim, HostCapabilities},
    launch_plan::resolve_launch_plan,
    load_fallback::{FallbackAction, LoadFailure, LoadFailureReason, LoadFallbackChain},
    main_window::WindowHost,
    runtime_paths::RuntimeLayout,
    startup_mode::execution_mode_for,
    window_content::{resolve_static_target, resolve_window_target, AssetProtocol},
    append_startup_log, DesktopConfig, DesktopHost, ExecutionMode, StartupError, WindowLoadTarget,
    DEFAULT_HOST_MODULE_SPECIFIER,
};

/// Everything the startup flow needs to know about this launch.
#[derive(Debug, Clone)]
pub struct StartupContext {
    pub config: DesktopConfig,
    pub layout: RuntimeLayout,
    pub mode: ExecutionMode,
    pub asset_protocol: AssetProtocol,
    pub shim_dir: PathBuf,
}

impl StartupContext {
    pub fn new(
        config: DesktopConfig,
        layout: RuntimeLayout,
        asset_protocol: AssetProtocol,
    ) -> Self {
        Self {
            mode: execution_mode_for(&config),
            config,
            layout,
            asset_protocol,
            shim_dir: std::env::temp_dir(),
        }
    }

    pub fn with_shim_dir(mut self, shim_dir: PathBuf) -> Self {
        self.shim_dir = shim_dir;
        self
    }

    fn resolve_static(&self) -> Result<WindowLoadTarget, StartupError> {
        resolve_static_target(&self.layout, self.asset_protocol)
    }
}

/// What the main window ended up showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupOutcome {
    Loaded(WindowLoadTarget),
    Diagnostic(DiagnosticPage),
}

/// Takes the host from cold start to a loaded window or a diagnostic page.
///
/// Recoverable failures are absorbed by the fallback chain. Errors returned here are fatal,
/// except `AlreadyStarting` when a second startup races the first.
pub async fn run_startup<W>(
    ctx: &StartupContext,
    host: &DesktopHost,
    window: &W,
) -> Result<StartupOutcome, StartupError>
where
    W: WindowHost + ?Sized,
{
    let Some(_starting) = AtomicFlagGuard::try_set(&host.is_starting) else {
        return Err(StartupError::AlreadyStarting);
    };
    append_startup_log(&format!(
        "starting desktop host: mode={} port={}",
        ctx.mode.as_str(),
        ctx.config.port
    ));

    let mut chain = LoadFallbackChain::new();
    let first_action = match ctx.mode {
        ExecutionMode::ProductionServerless => {
            match resolve_window_target(ctx.mode, ctx.config.port, &ctx.layout, ctx.asset_protocol)
            {
                Ok(target) => Some(FallbackAction::Load(target)),
                Err(StartupError::AssetNotFound { attempted }) => {
                    chain.on_static_assets_missing(&attempted)
                }
                Err(error) => return Err(error),
            }
        }
        ExecutionMode::Dev => Some(FallbackAction::Load(WindowLoadTarget::network(
            ctx.config.port,
        ))),
        ExecutionMode::ProductionNetworked => {
            launch_backend(ctx, host).await?;
            let mut probe = ReadinessProbe::new(ctx.config.port, ctx.config.readiness_timeout)
                .with_poll_interval(ctx.config.poll_interval)
                .with_attempt_timeout(ctx.config.attempt_timeout);
            match probe.wait().await {
                Ok(_) => Some(FallbackAction::Load(WindowLoadTarget::network(
                    ctx.config.port,
                ))),
                Err(error @ StartupError::ReadinessTimeout { .. }) => {
                    chain.on_readiness_timeout(&error, || ctx.resolve_static())
                }
                Err(error) => return Err(error),
            }
        }
    };

    Ok(drive_window(ctx, &mut chain, first_action, window).await)
}

/// Resolves, shims and spawns the backend. The shim is registered for cleanup before spawning.
async fn launch_backend(ctx: &StartupContext, host: &DesktopHost) -> Result<u32, StartupError> {
    let mut plan = resolve_launch_plan(&ctx.config, &ctx.layout)?;

    if let Some(entry) = plan.script_entry.clone() {
        let specifier = plan
            .host_module
            .clone()
            .unwrap_or_else(|| DEFAULT_HOST_MODULE_SPECIFIER.to_string());
        let capabilities =
            HostCapabilities::new(ctx.config.port, ctx.layout.resources_dir.as_deref());
        if let Some(artifact) =
            prepare_entry_shim(&entry, &specifier, &capabilities, &ctx.shim_dir).await?
        {
            plan = plan.with_script_entry(artifact.entry_path());
            host.cleanup.register(move || {
                artifact.cleanup();
            });
        }
    }

    host.supervisor.spawn(&plan, ctx.config.port)
}

async fn attempt_load<W>(
    ctx: &StartupContext,
    window: &W,
    target: &WindowLoadTarget,
) -> Result<(), LoadFailureReason>
where
    W: WindowHost + ?Sized,
{
    match target {
        WindowLoadTarget::Network { port } => {
            confirm_listening(*port, ctx.config.attempt_timeout).await?;
            window.load(target)?;
            // Navigation does not report failures back, so check the backend survived it.
            confirm_listening(*port, ctx.config.attempt_timeout).await
        }
        WindowLoadTarget::StaticAsset { index_path, .. } => {
            if !index_path.is_file() {
                return Err(LoadFailureReason::AssetMissing);
            }
            window.load(target)
        }
    }
}

async fn confirm_listening(
    port: u16,
    attempt_timeout: Duration,
) -> Result<(), LoadFailureReason> {
    match probe_once(port, attempt_timeout).await {
        ProbeOutcome::Connected => Ok(()),
        ProbeOutcome::Refused => Err(LoadFailureReason::ConnectionRefused),
        ProbeOutcome::Failed(reason) => Err(LoadFailureReason::Other(reason)),
    }
}

async fn drive_window<W>(
    ctx: &StartupContext,
    chain: &mut LoadFallbackChain,
    mut action: Option<FallbackAction>,
    window: &W,
) -> StartupOutcome
where
    W: WindowHost + ?Sized,
{
    loop {
        match action.take() {
            Some(FallbackAction::Load(target)) => match attempt_load(ctx, window, &target).await {
                Ok(()) => {
                    append_startup_log(&format!("window loaded {target}"));
                    return StartupOutcome::Loaded(target);
                }
                Err(reason) => {
                    action = chain.on_load_failure(&LoadFailure { target, reason }, || {
                        ctx.resolve_static()
                    });
                }
            },
            Some(FallbackAction::ShowDiagnostic(page)) => {
                if let Err(error) = window.show_diagnostic(&page) {
                    tracing::error!(%error, "failed to show diagnostic page");
                }
                return StartupOutcome::Diagnostic(page);
            }
            // The chain only goes quiet after it has produced its diagnostic.
            None => {
                let page = DiagnosticPage::packaged_assets_missing(&[]);
                if let Err(error) = window.show_diagnostic(&page) {
                    tracing::error!(%error, "failed to show diagnostic page");
                }
                return StartupOutcome::Diagnostic(page);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, path::Path, sync::Mutex};

    use super::*;
    use crate::diagnostic_page::DiagnosticKind;

    #[derive(Default)]
    struct RecordingWindow {
        loads: Mutex<Vec<WindowLoadTarget>>,
        diagnostics: Mutex<Vec<DiagnosticPage>>,
    }

    impl RecordingWindow {
        fn loads(&self) -> Vec<WindowLoadTarget> {
            self.loads.lock().expect("loads").clone()
        }

        fn diagnostics(&self) -> Vec<DiagnosticPage> {
            self.diagnostics.lock().expect("diagnostics").clone()
        }
    }

    impl WindowHost for RecordingWindow {
        fn load(&self, target: &WindowLoadTarget) -> Result<(), LoadFailureReason> {
            self.loads.lock().expect("loads").push(target.clone());
            Ok(())
        }

        fn show_diagnostic(&self, page: &DiagnosticPage) -> Result<(), String> {
            self.diagnostics.lock().expect("diagnostics").push(page.clone());
            Ok(())
        }
    }

    fn unused_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("local addr").port()
    }

    fn config(vars: &[(&str, String)]) -> DesktopConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect();
        DesktopConfig::from_lookup(|key| vars.get(key).cloned())
    }

    fn layout(root: &Path) -> RuntimeLayout {
        RuntimeLayout {
            resources_dir: Some(root.to_path_buf()),
            app_dir: Some(root.join("app")),
            ..RuntimeLayout::default()
        }
    }

    fn write_static_index(root: &Path) -> PathBuf {
        let index = root.join("app").join("dist").join("public").join("index.html");
        std::fs::create_dir_all(index.parent().expect("parent")).expect("mkdir");
        std::fs::write(&index, "<html></html>").expect("write index");
        index
    }

    #[tokio::test]
    async fn serverless_without_assets_shows_diagnostic_and_never_loads() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = config(&[("VITE_LOCAL", "true".to_string())]);
        let ctx = StartupContext::new(cfg, layout(temp.path()), AssetProtocol::FileUrl);
        let host = DesktopHost::new(ctx.mode, ctx.config.port);
        let window = RecordingWindow::default();

        let outcome = run_startup(&ctx, &host, &window).await.expect("startup");

        assert!(matches!(
            outcome,
            StartupOutcome::Diagnostic(DiagnosticPage {
                kind: DiagnosticKind::PackagedAssetsMissing { .. },
                ..
            })
        ));
        assert!(window.loads().is_empty());
        assert_eq!(window.diagnostics().len(), 1);
        assert!(window.diagnostics()[0]
            .to_document()
            .contains("Packaged assets missing"));
        assert!(!host.supervisor.is_running());
    }

    #[tokio::test]
    async fn serverless_loads_first_static_index() {
        let temp = tempfile::tempdir().expect("tempdir");
        let index = write_static_index(temp.path());
        let cfg = config(&[("VITE_LOCAL_ONLY", "1".to_string())]);
        let ctx = StartupContext::new(cfg, layout(temp.path()), AssetProtocol::FileUrl);
        let host = DesktopHost::new(ctx.mode, ctx.config.port);
        let window = RecordingWindow::default();

        let outcome = run_startup(&ctx, &host, &window).await.expect("startup");
        let expected = WindowLoadTarget::StaticAsset {
            index_path: index,
            protocol: AssetProtocol::FileUrl,
        };
        assert_eq!(outcome, StartupOutcome::Loaded(expected.clone()));
        assert_eq!(window.loads(), vec![expected]);
    }

    #[tokio::test]
    async fn dev_mode_with_refused_backend_falls_back_to_static() {
        let temp = tempfile::tempdir().expect("tempdir");
        let index = write_static_index(temp.path());
        let cfg = config(&[
            ("NODE_ENV", "development".to_string()),
            ("PORT", unused_port().to_string()),
        ]);
        let ctx = StartupContext::new(cfg, layout(temp.path()), AssetProtocol::FileUrl);
        assert_eq!(ctx.mode, ExecutionMode::Dev);
        let host = DesktopHost::new(ctx.mode, ctx.config.port);
        let window = RecordingWindow::default();

        let outcome = run_startup(&ctx, &host, &window).await.expect("startup");

        assert!(matches!(
            outcome,
            StartupOutcome::Loaded(WindowLoadTarget::StaticAsset { ref index_path, .. })
                if *index_path == index
        ));
        assert_eq!(window.loads().len(), 1);
        assert!(!window.loads()[0].is_network());
    }

    #[tokio::test]
    async fn dev_mode_loads_running_backend_directly() {
        let temp = tempfile::tempdir().expect("tempdir");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let cfg = config(&[
            ("NODE_ENV", "development".to_string()),
            ("PORT", port.to_string()),
        ]);
        let ctx = StartupContext::new(cfg, layout(temp.path()), AssetProtocol::FileUrl);
        let host = DesktopHost::new(ctx.mode, ctx.config.port);
        let window = RecordingWindow::default();

        let outcome = run_startup(&ctx, &host, &window).await.expect("startup");

        assert_eq!(outcome, StartupOutcome::Loaded(WindowLoadTarget::network(port)));
        assert_eq!(window.loads(), vec![WindowLoadTarget::network(port)]);
    }

    struct BackendStopsOnNavigation {
        listener: Mutex<Option<std::net::TcpListener>>,
        inner: RecordingWindow,
    }

    impl WindowHost for BackendStopsOnNavigation {
        fn load(&self, target: &WindowLoadTarget) -> Result<(), LoadFailureReason> {
            if target.is_network() {
                self.listener.lock().expect("listener").take();
            }
            self.inner.load(target)
        }

        fn show_diagnostic(&self, page: &DiagnosticPage) -> Result<(), String> {
            self.inner.show_diagnostic(page)
        }
    }

    #[tokio::test]
    async fn backend_lost_during_navigation_falls_back_to_static() {
        let temp = tempfile::tempdir().expect("tempdir");
        let index = write_static_index(temp.path());
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let cfg = config(&[
            ("NODE_ENV", "development".to_string()),
            ("PORT", port.to_string()),
        ]);
        let ctx = StartupContext::new(cfg, layout(temp.path()), AssetProtocol::FileUrl);
        let host = DesktopHost::new(ctx.mode, ctx.config.port);
        let window = BackendStopsOnNavigation {
            listener: Mutex::new(Some(listener)),
            inner: RecordingWindow::default(),
        };

        let outcome = run_startup(&ctx, &host, &window).await.expect("startup");

        let fallback = WindowLoadTarget::StaticAsset {
            index_path: index,
            protocol: AssetProtocol::FileUrl,
        };
        assert_eq!(outcome, StartupOutcome::Loaded(fallback.clone()));
        assert_eq!(
            window.inner.loads(),
            vec![WindowLoadTarget::network(port), fallback]
        );
        assert!(window.inner.diagnostics().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn networked_readiness_timeout_goes_to_fallback_without_network_load() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = config(&[
            ("WANDERAGENT_PACKAGED", "1".to_string()),
            ("PORT", unused_port().to_string()),
            ("WANDERAGENT_BACKEND_CMD", "sh -c 'sleep 30'".to_string()),
            ("WANDERAGENT_BACKEND_CWD", temp.path().display().to_string()),
            ("WANDERAGENT_BACKEND_TIMEOUT_MS", "600".to_string()),
        ]);
        let ctx = StartupContext::new(cfg, layout(temp.path()), AssetProtocol::FileUrl);
        assert_eq!(ctx.mode, ExecutionMode::ProductionNetworked);
        let host = DesktopHost::new(ctx.mode, ctx.config.port);
        let window = RecordingWindow::default();

        let outcome = run_startup(&ctx, &host, &window).await.expect("startup");

        assert!(matches!(outcome, StartupOutcome::Diagnostic(_)));
        assert!(window.loads().is_empty());
        assert!(host.supervisor.is_running());
        assert!(host.shutdown("test finished"));
        assert!(!host.supervisor.is_running());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn networked_entry_is_shimmed_and_cleaned_up_on_shutdown() {
        let temp = tempfile::tempdir().expect("tempdir");
        let shim_dir = tempfile::tempdir().expect("shim dir");
        let entry = temp.path().join("app").join("dist").join("index.js");
        std::fs::create_dir_all(entry.parent().expect("parent")).expect("mkdir");
        std::fs::write(&entry, "import host from 'wanderagent:desktop-host';\n").expect("entry");

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        // `true` stands in for the script runtime and accepts the shim path as an argument.
        let cfg = config(&[
            ("WANDERAGENT_PACKAGED", "1".to_string()),
            ("PORT", port.to_string()),
            ("WANDERAGENT_NODE_PATH", "true".to_string()),
        ]);
        let ctx = StartupContext::new(cfg, layout(temp.path()), AssetProtocol::FileUrl)
            .with_shim_dir(shim_dir.path().to_path_buf());
        let host = DesktopHost::new(ctx.mode, ctx.config.port);
        let window = RecordingWindow::default();

        let outcome = run_startup(&ctx, &host, &window).await.expect("startup");
        assert_eq!(outcome, StartupOutcome::Loaded(WindowLoadTarget::network(port)));
        assert_eq!(std::fs::read_dir(shim_dir.path()).expect("read").count(), 2);

        assert!(host.shutdown("normal exit"));
        assert_eq!(std::fs::read_dir(shim_dir.path()).expect("read").count(), 0);
    }

    #[tokio::test]
    async fn missing_backend_entry_is_fatal() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = config(&[("WANDERAGENT_PACKAGED", "1".to_string())]);
        let ctx = StartupContext::new(cfg, layout(temp.path()), AssetProtocol::FileUrl);
        let host = DesktopHost::new(ctx.mode, ctx.config.port);
        let window = RecordingWindow::default();

        let error = run_startup(&ctx, &host, &window)
            .await
            .expect_err("no backend entry exists");
        assert!(matches!(error, StartupError::EntryNotFound { .. }));
        assert!(error.is_fatal());
        assert!(window.loads().is_empty());
    }

    #[tokio::test]
    async fn concurrent_startup_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = config(&[("VITE_LOCAL", "yes".to_string())]);
        let ctx = StartupContext::new(cfg, layout(temp.path()), AssetProtocol::FileUrl);
        let host = DesktopHost::new(ctx.mode, ctx.config.port);
        let window = RecordingWindow::default();

        let _held = AtomicFlagGuard::try_set(&host.is_starting).expect("flag");
        let error = run_startup(&ctx, &host, &window)
            .await
            .expect_err("startup already in progress");
        assert!(matches!(error, StartupError::AlreadyStarting));
        assert!(!error.is_fatal());
    }
}
