use crate::{diagnostic_page::DiagnosticPage, load_fallback::LoadFailureReason, WindowLoadTarget};

/// Surface the startup flow drives. The desktop shell implements it over the main webview; the
/// headless runner and tests provide their own.
pub trait WindowHost: Send + Sync {
    fn load(&self, target: &WindowLoadTarget) -> Result<(), LoadFailureReason>;

    fn show_diagnostic(&self, page: &DiagnosticPage) -> Result<(), String>;
}

/// Records the outcome in the log only.
#[derive(Debug, Default)]
pub struct LoggingWindow;

impl WindowHost for LoggingWindow {
    fn load(&self, target: &WindowLoadTarget) -> Result<(), LoadFailureReason> {
        match target.location() {
            Some(location) => {
                tracing::info!(%location, "window content ready");
                Ok(())
            }
            None => Err(LoadFailureReason::Other(format!(
                "cannot express {target} as a URL"
            ))),
        }
    }

    fn show_diagnostic(&self, page: &DiagnosticPage) -> Result<(), String> {
        tracing::error!(title = %page.title, kind = ?page.kind, "startup ended on diagnostic page");
        Ok(())
    }
}

#[cfg(feature = "desktop")]
pub use desktop::TauriWindow;

#[cfg(feature = "desktop")]
mod desktop {
    use tauri::{AppHandle, Manager};

    use super::WindowHost;
    use crate::{
        diagnostic_page::DiagnosticPage, load_fallback::LoadFailureReason,
        static_assets::StaticAssetRoot, window_content::AssetProtocol, WindowLoadTarget,
        MAIN_WINDOW_LABEL,
    };

    pub struct TauriWindow {
        app_handle: AppHandle,
    }

    impl TauriWindow {
        pub fn new(app_handle: AppHandle) -> Self {
            Self { app_handle }
        }

        fn main_window(&self) -> Result<tauri::WebviewWindow, String> {
            self.app_handle
                .get_webview_window(MAIN_WINDOW_LABEL)
                .ok_or_else(|| "main window not found".to_string())
        }
    }

    impl WindowHost for TauriWindow {
        fn load(&self, target: &WindowLoadTarget) -> Result<(), LoadFailureReason> {
            let window = self.main_window().map_err(LoadFailureReason::Other)?;
            if let WindowLoadTarget::StaticAsset {
                protocol: AssetProtocol::AppScheme,
                ..
            } = target
            {
                let Some(root) = target.static_root() else {
                    return Err(LoadFailureReason::AssetMissing);
                };
                self.app_handle
                    .state::<StaticAssetRoot>()
                    .set(root.to_path_buf());
            }

            let location = target.location().ok_or_else(|| {
                LoadFailureReason::Other(format!("cannot express {target} as a URL"))
            })?;
            let serialized = serde_json::to_string(location.as_str())
                .map_err(|error| LoadFailureReason::Other(error.to_string()))?;
            window
                .eval(&format!("window.location.replace({serialized});"))
                .map_err(|error| LoadFailureReason::Other(error.to_string()))?;
            let _ = window.show();
            let _ = window.set_focus();
            tracing::info!(%location, "main window navigated");
            Ok(())
        }

        fn show_diagnostic(&self, page: &DiagnosticPage) -> Result<(), String> {
            let window = self.main_window()?;
            window
                .eval(&page.to_injection_script())
                .map_err(|error| format!("failed to render diagnostic page: {error}"))?;
            let _ = window.show();
            Ok(())
        }
    }
}
