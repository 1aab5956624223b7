use std::{future::Future, process::ExitCode};

use crate::{
    append_shutdown_log, append_startup_log,
    exit_events::{self, ExitSignal},
    logging,
    main_window::{LoggingWindow, WindowHost},
    runtime_paths::RuntimeLayout,
    startup_task::{run_startup, StartupContext, StartupOutcome},
    window_content::AssetProtocol,
    DesktopConfig, DesktopHost, DESKTOP_LOG_FILE, FATAL_EXIT_GRACE_PERIOD,
};

/// How a headless session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadlessExit {
    Completed,
    BackendExited,
    Signalled(ExitSignal),
    Failed,
}

impl HeadlessExit {
    pub fn exit_code(self) -> ExitCode {
        match self {
            Self::Failed => ExitCode::FAILURE,
            Self::Completed | Self::BackendExited | Self::Signalled(_) => ExitCode::SUCCESS,
        }
    }
}

/// Runs the startup flow without a webview and supervises the backend until a signal arrives.
pub fn run() -> ExitCode {
    let config = DesktopConfig::from_env();
    let log_path =
        logging::resolve_desktop_log_path(config.packaged_root_dir.clone(), DESKTOP_LOG_FILE);
    let _log_guard = logging::init_logging(&log_path);
    append_startup_log("desktop process starting (headless)");
    append_startup_log(&format!("desktop log path: {}", log_path.display()));

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(error) => {
            tracing::error!(%error, "failed to build async runtime");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(async move {
        let layout = RuntimeLayout::detect(&config);
        let ctx = StartupContext::new(config, layout, AssetProtocol::FileUrl);
        let host = DesktopHost::new(ctx.mode, ctx.config.port);
        supervise(&ctx, &host, &LoggingWindow, exit_events::shutdown_signal())
            .await
            .exit_code()
    })
}

/// Drives startup and then the running backend, shutting the host down on every way out.
///
/// `shutdown` is polled from the start, so a signal during the readiness wait still stops
/// the backend and removes the shim files.
pub async fn supervise<W, S>(
    ctx: &StartupContext,
    host: &DesktopHost,
    window: &W,
    shutdown: S,
) -> HeadlessExit
where
    W: WindowHost + ?Sized,
    S: Future<Output = ExitSignal>,
{
    tokio::pin!(shutdown);

    let startup = tokio::select! {
        result = run_startup(ctx, host, window) => result,
        signal = &mut shutdown => {
            append_shutdown_log("signal received during startup");
            host.shutdown(signal.as_str());
            return HeadlessExit::Signalled(signal);
        }
    };

    match startup {
        Ok(StartupOutcome::Loaded(target)) => {
            let location = target
                .location()
                .map(String::from)
                .unwrap_or_else(|| target.to_string());
            println!("{location}");
        }
        Ok(StartupOutcome::Diagnostic(page)) => {
            eprintln!("{}", page.title);
        }
        Err(error) if error.is_fatal() => {
            tracing::error!(%error, "desktop host startup failed");
            tokio::time::sleep(FATAL_EXIT_GRACE_PERIOD).await;
            host.shutdown("fatal startup error");
            return HeadlessExit::Failed;
        }
        Err(error) => {
            tracing::warn!(%error, "desktop host startup skipped");
        }
    }

    if !(ctx.mode.spawns_backend() && host.supervisor.is_running()) {
        host.shutdown("normal exit");
        return HeadlessExit::Completed;
    }

    tokio::select! {
        signal = &mut shutdown => {
            host.shutdown(signal.as_str());
            HeadlessExit::Signalled(signal)
        }
        exit = host.supervisor.wait_for_exit() => {
            match exit {
                Some(exit) if !exit.success() => {
                    tracing::warn!(
                        code = ?exit.code,
                        signal = ?exit.signal,
                        "backend process failed"
                    );
                }
                _ => append_shutdown_log(&format!("backend process ended: {exit:?}")),
            }
            host.shutdown("backend exited");
            HeadlessExit::BackendExited
        }
    }
}
