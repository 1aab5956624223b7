use std::{borrow::Cow, sync::Arc};

use tauri::{
    http::{header::CONTENT_TYPE, Request, Response, StatusCode},
    webview::PageLoadEvent,
    AppHandle, Manager, RunEvent, UriSchemeContext,
};

use crate::{
    append_desktop_log, append_shutdown_log, append_startup_log, exit_events, logging,
    main_window::TauriWindow,
    runtime_paths::RuntimeLayout,
    startup_task::{run_startup, StartupContext, StartupOutcome},
    static_assets::{mime_type_for, resolve_request_path, StaticAssetRoot},
    window_content::AssetProtocol,
    DesktopConfig, DesktopHost, ExecutionMode, DESKTOP_LOG_FILE, FATAL_EXIT_GRACE_PERIOD,
    MAIN_WINDOW_LABEL, STATIC_ASSET_SCHEME,
};

type SharedHost = Arc<DesktopHost>;

pub fn run() {
    let config = DesktopConfig::from_env();
    let log_path =
        logging::resolve_desktop_log_path(config.packaged_root_dir.clone(), DESKTOP_LOG_FILE);
    let _log_guard = logging::init_logging(&log_path);

    append_startup_log("desktop process starting");
    append_startup_log(&format!("desktop log path: {}", log_path.display()));

    let startup_config = config.clone();
    let mode = crate::startup_mode::execution_mode_for(&config);
    let open_devtools = mode == ExecutionMode::Dev || config.local_only;
    let host: SharedHost = Arc::new(DesktopHost::new(mode, config.port));

    tauri::Builder::default()
        .plugin(tauri_plugin_single_instance::init(|app, _args, _cwd| {
            if let Some(window) = app.get_webview_window(MAIN_WINDOW_LABEL) {
                let _ = window.unminimize();
                let _ = window.show();
                let _ = window.set_focus();
            }
            append_desktop_log("second instance launch redirected to the running window");
        }))
        .manage(Arc::clone(&host))
        .manage(StaticAssetRoot::default())
        .register_uri_scheme_protocol(STATIC_ASSET_SCHEME, serve_static_asset)
        .invoke_handler(tauri::generate_handler![
            crate::desktop_bridge_commands::desktop_bridge_ping,
            crate::desktop_bridge_commands::desktop_bridge_get_backend_state,
        ])
        .on_page_load(|webview, payload| match payload.event() {
            PageLoadEvent::Started => {
                append_desktop_log(&format!("page-load started: {}", payload.url()));
            }
            PageLoadEvent::Finished => {
                append_desktop_log(&format!("page-load finished: {}", payload.url()));
                if webview.label() == MAIN_WINDOW_LABEL && payload.url().scheme() == "http" {
                    let host = webview.app_handle().state::<SharedHost>();
                    if !host.supervisor.is_running() && host.mode.spawns_backend() {
                        tracing::warn!(
                            url = %payload.url(),
                            exit = ?host.supervisor.last_exit(),
                            "page finished loading after the backend process stopped"
                        );
                    }
                }
            }
        })
        .setup(move |app| {
            let app_handle = app.handle().clone();
            if open_devtools {
                if let Some(window) = app_handle.get_webview_window(MAIN_WINDOW_LABEL) {
                    window.open_devtools();
                }
            }
            spawn_startup_task(app_handle.clone(), startup_config);
            spawn_signal_listener(app_handle);
            Ok(())
        })
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|app_handle, event| {
            if let RunEvent::Exit = event {
                let host = app_handle.state::<SharedHost>();
                host.shutdown("application exit");
            }
        });
}

fn spawn_startup_task(app_handle: AppHandle, config: DesktopConfig) {
    tauri::async_runtime::spawn(async move {
        let mut layout = RuntimeLayout::detect(&config);
        if config.resources_dir.is_none() {
            match app_handle.path().resource_dir() {
                Ok(resource_dir) => layout = layout.with_resources_dir(resource_dir),
                Err(error) => {
                    append_startup_log(&format!("failed to resolve resource dir: {error}"));
                }
            }
        }
        let ctx = StartupContext::new(config, layout, AssetProtocol::AppScheme);
        let host = Arc::clone(&app_handle.state::<SharedHost>());
        let window = TauriWindow::new(app_handle.clone());

        match run_startup(&ctx, &host, &window).await {
            Ok(StartupOutcome::Loaded(target)) => {
                append_startup_log(&format!("startup finished: {target}"));
            }
            Ok(StartupOutcome::Diagnostic(page)) => {
                append_startup_log(&format!("startup finished on diagnostic: {}", page.title));
            }
            Err(error) if error.is_fatal() => {
                tracing::error!(%error, "desktop host startup failed");
                tokio::time::sleep(FATAL_EXIT_GRACE_PERIOD).await;
                host.shutdown("fatal startup error");
                app_handle.exit(1);
            }
            Err(error) => {
                append_startup_log(&format!("startup skipped: {error}"));
            }
        }
    });
}

fn spawn_signal_listener(app_handle: AppHandle) {
    tauri::async_runtime::spawn(async move {
        let signal = exit_events::shutdown_signal().await;
        let host = Arc::clone(&app_handle.state::<SharedHost>());
        host.shutdown(signal.as_str());
        append_shutdown_log("exiting after signal");
        app_handle.exit(0);
    });
}

fn serve_static_asset(
    ctx: UriSchemeContext<'_, tauri::Wry>,
    request: Request<Vec<u8>>,
) -> Response<Cow<'static, [u8]>> {
    let Some(root) = ctx.app_handle().state::<StaticAssetRoot>().get() else {
        return status_response(StatusCode::SERVICE_UNAVAILABLE);
    };
    let Some(path) = resolve_request_path(&root, request.uri().path()) else {
        return status_response(StatusCode::NOT_FOUND);
    };

    match std::fs::read(&path) {
        Ok(body) => Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, mime_type_for(&path))
            .body(Cow::Owned(body))
            .unwrap_or_else(|_| status_response(StatusCode::INTERNAL_SERVER_ERROR)),
        Err(error) => {
            append_desktop_log(&format!(
                "failed to read static asset {}: {error}",
                path.display()
            ));
            status_response(StatusCode::NOT_FOUND)
        }
    }
}

fn status_response(status: StatusCode) -> Response<Cow<'static, [u8]>> {
    let mut response = Response::new(Cow::Borrowed(&[][..]));
    *response.status_mut() = status;
    response
}
