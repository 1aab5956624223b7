//! Adapter for backend entry scripts that import the desktop host module.
//!
//! The backend runs on an external script runtime whose loader only understands ES modules
//! for `.mjs` files and knows nothing about the host module specifier. When the entry imports
//! that specifier, a generated adapter module plus a rewritten copy of the entry are written
//! to the temp directory and the copy is spawned instead of the original.

use std::{
    path::{Path, PathBuf},
    process,
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
};

use regex::{NoExpand, Regex};
use serde::Serialize;

use crate::{StartupError, SHIM_FILE_PREFIX, SHIM_TARGET_EXTENSION};

static SHIM_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Values re-exported by the adapter module.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostCapabilities {
    pub desktop: bool,
    pub mode: &'static str,
    pub port: u16,
    pub platform: &'static str,
    pub resources_dir: Option<String>,
    pub host_version: &'static str,
}

const CAPABILITY_EXPORTS: [&str; 6] = [
    "desktop",
    "mode",
    "port",
    "platform",
    "resourcesDir",
    "hostVersion",
];

impl HostCapabilities {
    pub fn new(port: u16, resources_dir: Option<&Path>) -> Self {
        Self {
            desktop: true,
            mode: crate::PRODUCTION_NODE_ENV,
            port,
            platform: std::env::consts::OS,
            resources_dir: resources_dir.map(|dir| dir.to_string_lossy().to_string()),
            host_version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Generated adapter + rewritten entry. Files are removed once, on `cleanup` or drop.
#[derive(Debug)]
pub struct ShimArtifact {
    adapter_path: PathBuf,
    entry_path: PathBuf,
    cleaned: AtomicBool,
}

impl ShimArtifact {
    pub fn adapter_path(&self) -> &Path {
        &self.adapter_path
    }

    pub fn entry_path(&self) -> &Path {
        &self.entry_path
    }

    /// Returns `true` only for the call that actually removed the files.
    pub fn cleanup(&self) -> bool {
        if self.cleaned.swap(true, Ordering::AcqRel) {
            return false;
        }
        for path in [&self.entry_path, &self.adapter_path] {
            let _ = std::fs::remove_file(path);
        }
        tracing::debug!(
            adapter = %self.adapter_path.display(),
            entry = %self.entry_path.display(),
            "removed module shim files"
        );
        true
    }
}

impl Drop for ShimArtifact {
    fn drop(&mut self) {
        self.cleanup();
    }
}

const HOST_BINDING: &str = "__wanderagentHost";
const CREATE_REQUIRE_BINDING: &str = "__wanderagentCreateRequire";

fn host_module_patterns(specifier: &str) -> Result<[Regex; 4], regex::Error> {
    let quoted = format!(r#"["']{}["']"#, regex::escape(specifier));
    Ok([
        Regex::new(&format!(r"from\s+{quoted}"))?,
        Regex::new(&format!(r"import\s+{quoted}"))?,
        Regex::new(&format!(r"import\(\s*{quoted}\s*\)"))?,
        Regex::new(&format!(r"\brequire\(\s*{quoted}\s*\)"))?,
    ])
}

pub fn references_host_module(source: &str, specifier: &str) -> bool {
    host_module_patterns(specifier)
        .map(|patterns| patterns.iter().any(|pattern| pattern.is_match(source)))
        .unwrap_or(false)
}

/// Redirects static, side-effect and dynamic imports and `require` calls of `specifier` to
/// `replacement`.
///
/// `require` calls become a reference to the adapter's default export. The rewritten file is
/// an ES module, so unless the entry declares its own `require` one is created relative to
/// `entry`, keeping its other `require` calls resolving as before.
pub fn rewrite_host_module_imports(
    source: &str,
    specifier: &str,
    replacement: &str,
    entry: &Path,
) -> Result<String, regex::Error> {
    let [from_clause, bare_import, dynamic_import, require_call] =
        host_module_patterns(specifier)?;
    let target = js_string_literal(replacement);

    let rewritten = from_clause.replace_all(source, NoExpand(&format!("from {target}")));
    let rewritten = bare_import.replace_all(&rewritten, NoExpand(&format!("import {target}")));
    let rewritten = dynamic_import.replace_all(&rewritten, NoExpand(&format!("import({target})")));
    if !require_call.is_match(&rewritten) {
        return Ok(rewritten.into_owned());
    }
    let rewritten = require_call.replace_all(&rewritten, NoExpand(HOST_BINDING));

    let mut prelude = format!("import {HOST_BINDING} from {target};\n");
    let declares_require = Regex::new(r"\b(?:const|let|var|function)\s+require\b")?;
    let calls_require = Regex::new(r"\brequire\s*\(")?;
    if calls_require.is_match(&rewritten) && !declares_require.is_match(&rewritten) {
        let base = js_string_literal(&entry.to_string_lossy());
        prelude.push_str(&format!(
            "import {{ createRequire as {CREATE_REQUIRE_BINDING} }} from \"module\";\n\
             const require = {CREATE_REQUIRE_BINDING}({base});\n"
        ));
    }
    Ok(insert_prelude(&rewritten, &prelude))
}

fn js_string_literal(raw: &str) -> String {
    serde_json::to_string(raw).unwrap_or_else(|_| "\"\"".to_string())
}

// A hashbang must stay on the first line.
fn insert_prelude(source: &str, prelude: &str) -> String {
    match source.strip_prefix("#!") {
        Some(_) => {
            let split = source.find('\n').map_or(source.len(), |index| index + 1);
            let (hashbang, body) = source.split_at(split);
            let separator = if hashbang.ends_with('\n') { "" } else { "\n" };
            format!("{hashbang}{separator}{prelude}{body}")
        }
        None => format!("{prelude}{source}"),
    }
}

pub fn render_adapter_module(capabilities: &HostCapabilities) -> String {
    let payload = serde_json::to_string(capabilities).unwrap_or_else(|_| "{}".to_string());
    let mut module = String::from("// Generated by the WanderAgent desktop host.\n");
    module.push_str(&format!("const host = Object.freeze({payload});\n"));
    module.push_str("export default host;\n");
    for name in CAPABILITY_EXPORTS {
        module.push_str(&format!("export const {name} = host.{name};\n"));
    }
    module
}

fn unique_shim_paths(temp_dir: &Path) -> (PathBuf, PathBuf) {
    let stamp = format!(
        "{}-{}-{}",
        process::id(),
        chrono::Utc::now().timestamp_millis(),
        SHIM_SEQUENCE.fetch_add(1, Ordering::Relaxed)
    );
    (
        temp_dir.join(format!("{SHIM_FILE_PREFIX}-host-shim-{stamp}.{SHIM_TARGET_EXTENSION}")),
        temp_dir.join(format!("{SHIM_FILE_PREFIX}-main-{stamp}.{SHIM_TARGET_EXTENSION}")),
    )
}

/// Writes the adapter and rewritten entry when `entry` imports `specifier`.
///
/// Returns `Ok(None)` when the entry does not reference the host module and can be spawned
/// as-is.
pub async fn prepare_entry_shim(
    entry: &Path,
    specifier: &str,
    capabilities: &HostCapabilities,
    temp_dir: &Path,
) -> Result<Option<ShimArtifact>, StartupError> {
    let source = tokio::fs::read_to_string(entry).await.map_err(|error| {
        StartupError::InvalidLaunchConfig(format!(
            "failed to read backend entry {}: {error}",
            entry.display()
        ))
    })?;
    if !references_host_module(&source, specifier) {
        return Ok(None);
    }

    let (adapter_path, entry_path) = unique_shim_paths(temp_dir);
    let adapter_name = adapter_path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let rewritten =
        rewrite_host_module_imports(&source, specifier, &format!("./{adapter_name}"), entry)
            .map_err(|error| {
                StartupError::InvalidLaunchConfig(format!("invalid host module specifier: {error}"))
            })?;

    tokio::fs::write(&adapter_path, render_adapter_module(capabilities))
        .await
        .map_err(|source| StartupError::ShimWriteFailure {
            path: adapter_path.clone(),
            source,
        })?;
    // From here on the artifact owns both paths, so a failed second write still removes the first.
    let artifact = ShimArtifact {
        adapter_path,
        entry_path,
        cleaned: AtomicBool::new(false),
    };
    tokio::fs::write(&artifact.entry_path, rewritten)
        .await
        .map_err(|source| StartupError::ShimWriteFailure {
            path: artifact.entry_path.clone(),
            source,
        })?;

    tracing::info!(
        entry = %entry.display(),
        shim_entry = %artifact.entry_path.display(),
        adapter = %artifact.adapter_path.display(),
        "prepared module shim for backend entry"
    );
    Ok(Some(artifact))
}
