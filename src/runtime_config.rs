use std::{env, path::PathBuf, time::Duration};

use crate::{
    runtime_paths, BACKEND_CMD_ENV, BACKEND_CWD_ENV, BACKEND_POLL_INTERVAL_ENV,
    BACKEND_POLL_INTERVAL_MAX_MS, BACKEND_POLL_INTERVAL_MIN_MS, BACKEND_PROBE_ATTEMPT_TIMEOUT_MS,
    BACKEND_TIMEOUT_ENV, BACKEND_TIMEOUT_MAX_MS, BACKEND_TIMEOUT_MIN_MS,
    DEFAULT_BACKEND_POLL_INTERVAL_MS, DEFAULT_BACKEND_PORT, DEFAULT_BACKEND_TIMEOUT_MS,
    DEFAULT_SCRIPT_RUNTIME, DEV_ROOT_ENV, LOCAL_ONLY_ENVS, NODE_ENV, PACKAGED_ENV, PORT_ENV,
    RESOURCES_DIR_ENV, SCRIPT_RUNTIME_ENV,
};

/// Everything the startup supervisor reads from the environment, captured once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopConfig {
    pub port: u16,
    pub local_only: bool,
    pub development: bool,
    pub packaged: bool,
    pub readiness_timeout: Duration,
    pub poll_interval: Duration,
    pub attempt_timeout: Duration,
    pub backend_cmd: Option<String>,
    pub backend_cwd: Option<PathBuf>,
    pub script_runtime: String,
    pub resources_dir: Option<PathBuf>,
    pub dev_root: Option<PathBuf>,
    pub packaged_root_dir: Option<PathBuf>,
}

impl DesktopConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let local_only = LOCAL_ONLY_ENVS
            .iter()
            .any(|key| lookup(key).is_some_and(|value| parse_truthy_flag(&value)));
        let development = lookup(NODE_ENV)
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("development"));
        let packaged = lookup(PACKAGED_ENV)
            .map(|value| parse_truthy_flag(&value))
            .unwrap_or(!cfg!(debug_assertions));

        Self {
            port: parse_port(lookup(PORT_ENV).as_deref()),
            local_only,
            development,
            packaged,
            readiness_timeout: parse_clamped_ms(
                BACKEND_TIMEOUT_ENV,
                lookup(BACKEND_TIMEOUT_ENV).as_deref(),
                DEFAULT_BACKEND_TIMEOUT_MS,
                BACKEND_TIMEOUT_MIN_MS,
                BACKEND_TIMEOUT_MAX_MS,
            ),
            poll_interval: parse_clamped_ms(
                BACKEND_POLL_INTERVAL_ENV,
                lookup(BACKEND_POLL_INTERVAL_ENV).as_deref(),
                DEFAULT_BACKEND_POLL_INTERVAL_MS,
                BACKEND_POLL_INTERVAL_MIN_MS,
                BACKEND_POLL_INTERVAL_MAX_MS,
            ),
            attempt_timeout: Duration::from_millis(BACKEND_PROBE_ATTEMPT_TIMEOUT_MS),
            backend_cmd: non_empty(BACKEND_CMD_ENV),
            backend_cwd: non_empty(BACKEND_CWD_ENV).map(PathBuf::from),
            script_runtime: non_empty(SCRIPT_RUNTIME_ENV)
                .unwrap_or_else(|| DEFAULT_SCRIPT_RUNTIME.to_string()),
            resources_dir: non_empty(RESOURCES_DIR_ENV).map(PathBuf::from),
            dev_root: non_empty(DEV_ROOT_ENV).map(PathBuf::from),
            packaged_root_dir: runtime_paths::default_packaged_root_dir(),
        }
    }

    pub fn backend_url(&self) -> String {
        format!("http://localhost:{}/", self.port)
    }
}

/// Accepts `true`, `1` and `yes` in any case.
pub fn parse_truthy_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

fn parse_port(raw: Option<&str>) -> u16 {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return DEFAULT_BACKEND_PORT;
    };
    match raw.parse::<u16>() {
        Ok(port) if port > 0 => port,
        _ => {
            tracing::warn!(
                value = raw,
                fallback_port = DEFAULT_BACKEND_PORT,
                "invalid {PORT_ENV}, falling back to default port"
            );
            DEFAULT_BACKEND_PORT
        }
    }
}

fn parse_clamped_ms(
    key: &str,
    raw: Option<&str>,
    default_ms: u64,
    min_ms: u64,
    max_ms: u64,
) -> Duration {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Duration::from_millis(default_ms);
    };
    match raw.parse::<u64>() {
        Ok(value) => {
            let clamped = value.clamp(min_ms, max_ms);
            if clamped != value {
                tracing::warn!(key, value, clamped, "duration out of range, clamping");
            }
            Duration::from_millis(clamped)
        }
        Err(_) => {
            tracing::warn!(key, value = raw, default_ms, "invalid duration, using default");
            Duration::from_millis(default_ms)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> DesktopConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        DesktopConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = config_from(&[]);
        assert_eq!(config.port, 5000);
        assert!(!config.local_only);
        assert!(!config.development);
        assert_eq!(config.readiness_timeout, Duration::from_millis(20_000));
        assert_eq!(config.poll_interval, Duration::from_millis(200));
        assert_eq!(config.script_runtime, "node");
        assert_eq!(config.backend_url(), "http://localhost:5000/");
    }

    #[test]
    fn local_only_accepts_any_truthy_spelling_on_any_alias() {
        assert!(config_from(&[("VITE_LOCAL", "TRUE")]).local_only);
        assert!(config_from(&[("VITE_LOCAL_ONLY", "1")]).local_only);
        assert!(config_from(&[("vite_local", "Yes")]).local_only);
        assert!(!config_from(&[("VITE_LOCAL", "off")]).local_only);
        assert!(!config_from(&[("VITE_LOCAL", "")]).local_only);
    }

    #[test]
    fn development_flag_comes_from_node_env() {
        assert!(config_from(&[("NODE_ENV", "development")]).development);
        assert!(!config_from(&[("NODE_ENV", "production")]).development);
    }

    #[test]
    fn packaged_override_wins_over_build_profile() {
        assert!(config_from(&[("WANDERAGENT_PACKAGED", "1")]).packaged);
        assert!(!config_from(&[("WANDERAGENT_PACKAGED", "0")]).packaged);
    }

    #[test]
    fn invalid_port_falls_back_to_default() {
        assert_eq!(config_from(&[("PORT", "8080")]).port, 8080);
        assert_eq!(config_from(&[("PORT", "not-a-port")]).port, 5000);
        assert_eq!(config_from(&[("PORT", "0")]).port, 5000);
        assert_eq!(config_from(&[("PORT", "70000")]).port, 5000);
    }

    #[test]
    fn readiness_durations_are_clamped() {
        let config = config_from(&[
            ("WANDERAGENT_BACKEND_TIMEOUT_MS", "10"),
            ("WANDERAGENT_BACKEND_POLL_INTERVAL_MS", "999999"),
        ]);
        assert_eq!(config.readiness_timeout, Duration::from_millis(500));
        assert_eq!(config.poll_interval, Duration::from_millis(5_000));

        let invalid = config_from(&[("WANDERAGENT_BACKEND_TIMEOUT_MS", "soon")]);
        assert_eq!(invalid.readiness_timeout, Duration::from_millis(20_000));
    }

    #[test]
    fn blank_overrides_are_ignored() {
        let config = config_from(&[
            ("WANDERAGENT_BACKEND_CMD", "   "),
            ("WANDERAGENT_NODE_PATH", ""),
        ]);
        assert_eq!(config.backend_cmd, None);
        assert_eq!(config.script_runtime, "node");
    }
}
