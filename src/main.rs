#![cfg_attr(
    all(not(debug_assertions), feature = "desktop"),
    windows_subsystem = "windows"
)]

#[cfg(feature = "desktop")]
fn main() {
    wanderagent_desktop::app_runtime::run();
}

#[cfg(not(feature = "desktop"))]
fn main() -> std::process::ExitCode {
    wanderagent_desktop::headless_runtime::run()
}
