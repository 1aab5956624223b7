//! Startup supervisor for the WanderAgent desktop host.
//!
//! Resolves the execution mode, locates and launches the bundled backend, waits for it to accept
//! connections and decides what the main window shows, falling back to packaged static assets
//! and finally to a diagnostic page. The Tauri shell is behind the `desktop` feature; the
//! default build runs the same flow headless.

mod app_constants;
mod app_helpers;
mod app_types;
pub mod backend_process;
pub mod backend_readiness;
pub mod diagnostic_page;
pub mod entry_shim;
pub mod exit_cleanup;
pub mod exit_events;
pub mod headless_runtime;
pub mod launch_plan;
pub mod load_fallback;
pub mod logging;
pub mod main_window;
pub mod runtime_config;
pub mod runtime_paths;
pub mod startup_error;
pub mod startup_mode;
pub mod startup_task;
pub mod static_assets;
pub mod window_content;

#[cfg(feature = "desktop")]
pub mod app_runtime;
#[cfg(feature = "desktop")]
mod desktop_bridge_commands;

pub use app_constants::*;
pub use app_helpers::{append_desktop_log, append_shutdown_log, append_startup_log};
pub use app_types::{BackendBridgeState, DesktopHost};
pub use backend_process::BackendSupervisor;
pub use exit_cleanup::ExitCleanup;
pub use runtime_config::DesktopConfig;
pub use startup_error::StartupError;
pub use startup_mode::ExecutionMode;
pub use window_content::WindowLoadTarget;
