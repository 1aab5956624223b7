use crate::logging::{self, DesktopLogCategory};

pub fn append_desktop_log(message: &str) {
    logging::append_desktop_log(DesktopLogCategory::Runtime, message);
}

pub fn append_startup_log(message: &str) {
    logging::append_desktop_log(DesktopLogCategory::Startup, message);
}

pub fn append_shutdown_log(message: &str) {
    logging::append_desktop_log(DesktopLogCategory::Shutdown, message);
}
