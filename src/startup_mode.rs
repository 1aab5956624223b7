use crate::DesktopConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionMode {
    /// A developer-managed backend is expected to be running already.
    Dev,
    /// The host spawns the bundled backend and loads it over the network.
    ProductionNetworked,
    /// No backend; the window loads pre-built static content.
    ProductionServerless,
}

impl ExecutionMode {
    pub fn spawns_backend(self) -> bool {
        self == ExecutionMode::ProductionNetworked
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionMode::Dev => "dev",
            ExecutionMode::ProductionNetworked => "production-networked",
            ExecutionMode::ProductionServerless => "production-serverless",
        }
    }
}

pub fn resolve_execution_mode(
    local_only: bool,
    development: bool,
    packaged: bool,
) -> ExecutionMode {
    if local_only {
        return ExecutionMode::ProductionServerless;
    }
    if development || !packaged {
        return ExecutionMode::Dev;
    }
    ExecutionMode::ProductionNetworked
}

pub fn execution_mode_for(config: &DesktopConfig) -> ExecutionMode {
    resolve_execution_mode(config.local_only, config.development, config.packaged)
}
