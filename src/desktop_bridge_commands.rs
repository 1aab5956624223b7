use std::sync::Arc;

use tauri::{AppHandle, Manager};

use crate::{BackendBridgeState, DesktopHost};

#[tauri::command]
pub(crate) fn desktop_bridge_ping() -> bool {
    true
}

#[tauri::command]
pub(crate) fn desktop_bridge_get_backend_state(app_handle: AppHandle) -> BackendBridgeState {
    let host = app_handle.state::<Arc<DesktopHost>>();
    host.bridge_state()
}
