use std::time::Duration;

pub const DEFAULT_BACKEND_PORT: u16 = 5000;
pub const BACKEND_HOST: &str = "127.0.0.1";

pub const PORT_ENV: &str = "PORT";
pub const NODE_ENV: &str = "NODE_ENV";
pub const LOCAL_ONLY_ENVS: [&str; 3] = ["VITE_LOCAL", "VITE_LOCAL_ONLY", "vite_local"];
pub const PACKAGED_ENV: &str = "WANDERAGENT_PACKAGED";
pub const BACKEND_CMD_ENV: &str = "WANDERAGENT_BACKEND_CMD";
pub const BACKEND_CWD_ENV: &str = "WANDERAGENT_BACKEND_CWD";
pub const BACKEND_TIMEOUT_ENV: &str = "WANDERAGENT_BACKEND_TIMEOUT_MS";
pub const BACKEND_POLL_INTERVAL_ENV: &str = "WANDERAGENT_BACKEND_POLL_INTERVAL_MS";
pub const SCRIPT_RUNTIME_ENV: &str = "WANDERAGENT_NODE_PATH";
pub const RESOURCES_DIR_ENV: &str = "WANDERAGENT_RESOURCES_DIR";
pub const DEV_ROOT_ENV: &str = "WANDERAGENT_ROOT";
pub const LOG_FILTER_ENV: &str = "WANDERAGENT_LOG";

pub const DEFAULT_SCRIPT_RUNTIME: &str = "node";
pub const PRODUCTION_NODE_ENV: &str = "production";

pub const DEFAULT_BACKEND_TIMEOUT_MS: u64 = 20_000;
pub const BACKEND_TIMEOUT_MIN_MS: u64 = 500;
pub const BACKEND_TIMEOUT_MAX_MS: u64 = 10 * 60 * 1000;
pub const DEFAULT_BACKEND_POLL_INTERVAL_MS: u64 = 200;
pub const BACKEND_POLL_INTERVAL_MIN_MS: u64 = 20;
pub const BACKEND_POLL_INTERVAL_MAX_MS: u64 = 5_000;
pub const BACKEND_PROBE_ATTEMPT_TIMEOUT_MS: u64 = 1_500;

pub const CHILD_EXIT_POLL_INTERVAL: Duration = Duration::from_millis(250);
pub const FATAL_EXIT_GRACE_PERIOD: Duration = Duration::from_millis(1_000);

pub const SERVER_EXECUTABLE_STEM: &str = "rest-express";
pub const RUNTIME_MANIFEST_FILE: &str = "runtime-manifest.json";
pub const SHIM_FILE_PREFIX: &str = "wanderagent";
pub const SHIM_TARGET_EXTENSION: &str = "mjs";
pub const DEFAULT_HOST_MODULE_SPECIFIER: &str = "wanderagent:desktop-host";

pub const PACKAGED_ROOT_DIR_NAME: &str = ".wanderagent";
pub const DESKTOP_LOG_FILE: &str = "desktop.log";

pub const STATIC_ASSET_SCHEME: &str = "wanderagent-static";
pub const MAIN_WINDOW_LABEL: &str = "main";
