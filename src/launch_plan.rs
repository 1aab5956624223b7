use std::{
    collections::HashSet,
    fs, io,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::{
    runtime_paths::{self, ArtifactKind, RuntimeLayout},
    DesktopConfig, StartupError, DEFAULT_HOST_MODULE_SPECIFIER, RUNTIME_MANIFEST_FILE,
};

const ENTRY_ALTERNATE_EXTENSIONS: [&str; 2] = ["mjs", "cjs"];

/// Optional `runtime-manifest.json` placed next to the backend entry.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeManifest {
    pub runtime: Option<String>,
    pub entrypoint: Option<String>,
    pub host_module: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocatedBackend {
    /// A script handed to the script runtime.
    Script(PathBuf),
    /// A self-contained server binary.
    Executable(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub cmd: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub script_entry: Option<PathBuf>,
    pub host_module: Option<String>,
}

impl LaunchPlan {
    /// Points the plan at a different script, e.g. a rewritten copy of the entry.
    pub fn with_script_entry(mut self, entry: &Path) -> Self {
        let entry_arg = entry.to_string_lossy().to_string();
        if let Some(original) = self.script_entry.as_ref() {
            let original_arg = original.to_string_lossy();
            for arg in self.args.iter_mut().filter(|arg| **arg == *original_arg) {
                *arg = entry_arg.clone();
            }
        }
        self.script_entry = Some(entry.to_path_buf());
        self
    }
}

pub fn build_debug_command(plan: &LaunchPlan) -> Vec<String> {
    let mut parts = vec![plan.cmd.clone()];
    parts.extend(plan.args.clone());
    parts
}

/// The literal candidate, then its `.mjs` and `.cjs` alternates when it names a `.js` file.
pub fn entry_variants(candidate: &Path) -> Vec<PathBuf> {
    let mut variants = vec![candidate.to_path_buf()];
    if candidate.extension().and_then(|ext| ext.to_str()) == Some("js") {
        variants.extend(
            ENTRY_ALTERNATE_EXTENSIONS
                .iter()
                .map(|ext| candidate.with_extension(ext)),
        );
    }
    variants
}

pub fn locate_backend_entry(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates
        .iter()
        .flat_map(|candidate| entry_variants(candidate))
        .find(|path| path.is_file())
}

/// First existing executable candidate that is not the running executable itself.
pub fn locate_standalone_executable(
    candidates: &[PathBuf],
    current_exe: Option<&Path>,
) -> Option<PathBuf> {
    let current_exe = current_exe.map(runtime_paths::resolve_absolute);
    let mut seen = HashSet::new();
    candidates
        .iter()
        .map(|candidate| runtime_paths::resolve_absolute(candidate))
        .filter(|resolved| seen.insert(resolved.clone()))
        .filter(|resolved| current_exe.as_ref() != Some(resolved))
        .find(|resolved| resolved.is_file())
}

pub fn locate_backend(
    entry_candidates: &[PathBuf],
    executable_candidates: &[PathBuf],
    current_exe: Option<&Path>,
) -> Result<LocatedBackend, StartupError> {
    if let Some(entry) = locate_backend_entry(entry_candidates) {
        return Ok(LocatedBackend::Script(entry));
    }
    tracing::warn!(
        attempted = ?entry_candidates,
        "backend entry not found, checking for a packaged server executable"
    );

    if let Some(executable) = locate_standalone_executable(executable_candidates, current_exe) {
        return Ok(LocatedBackend::Executable(executable));
    }

    let attempted = entry_candidates
        .iter()
        .flat_map(|candidate| entry_variants(candidate))
        .chain(executable_candidates.iter().cloned())
        .collect();
    Err(StartupError::EntryNotFound { attempted })
}

pub fn resolve_launch_plan(
    config: &DesktopConfig,
    layout: &RuntimeLayout,
) -> Result<LaunchPlan, StartupError> {
    if let Some(custom_cmd) = config.backend_cmd.as_deref() {
        return resolve_custom_launch(config, custom_cmd);
    }

    let located = locate_backend(
        &layout.candidates(ArtifactKind::BackendEntry),
        &layout.candidates(ArtifactKind::StandaloneExecutable),
        layout.executable.as_deref(),
    )?;
    match located {
        LocatedBackend::Script(entry) => resolve_script_launch(config, entry),
        LocatedBackend::Executable(executable) => {
            let cwd = config
                .backend_cwd
                .clone()
                .unwrap_or_else(|| parent_or_self(&executable));
            Ok(LaunchPlan {
                cmd: executable.to_string_lossy().to_string(),
                args: Vec::new(),
                cwd,
                script_entry: None,
                host_module: None,
            })
        }
    }
}

fn resolve_custom_launch(
    config: &DesktopConfig,
    custom_cmd: &str,
) -> Result<LaunchPlan, StartupError> {
    let mut pieces = shlex::split(custom_cmd).ok_or_else(|| {
        StartupError::InvalidLaunchConfig(format!("cannot parse backend command: {custom_cmd}"))
    })?;
    if pieces.is_empty() {
        return Err(StartupError::InvalidLaunchConfig(
            "backend command is empty".to_string(),
        ));
    }

    let cmd = pieces.remove(0);
    let cwd = match config.backend_cwd.clone().or_else(|| config.dev_root.clone()) {
        Some(cwd) => cwd,
        None => std::env::current_dir().map_err(|error| {
            StartupError::InvalidLaunchConfig(format!("cannot read working directory: {error}"))
        })?,
    };
    Ok(LaunchPlan {
        cmd,
        args: pieces,
        cwd,
        script_entry: None,
        host_module: None,
    })
}

fn resolve_script_launch(
    config: &DesktopConfig,
    entry: PathBuf,
) -> Result<LaunchPlan, StartupError> {
    let entry_dir = parent_or_self(&entry);
    let manifest = read_runtime_manifest(&entry_dir)?.unwrap_or_default();

    let entry = match manifest.entrypoint.as_deref() {
        Some(relative) => {
            let declared = entry_dir.join(relative);
            if !declared.is_file() {
                return Err(StartupError::EntryNotFound {
                    attempted: vec![declared],
                });
            }
            declared
        }
        None => entry,
    };

    let cmd = match manifest.runtime.as_deref() {
        Some(runtime) if runtime.contains(['/', '\\']) => {
            entry_dir.join(runtime).to_string_lossy().to_string()
        }
        Some(runtime) => runtime.to_string(),
        None => config.script_runtime.clone(),
    };
    // dist/index.js runs from the app root so relative asset lookups match the dev tree.
    let cwd = config
        .backend_cwd
        .clone()
        .unwrap_or_else(|| parent_or_self(&entry_dir));

    Ok(LaunchPlan {
        cmd,
        args: vec![entry.to_string_lossy().to_string()],
        cwd,
        host_module: Some(
            manifest
                .host_module
                .unwrap_or_else(|| DEFAULT_HOST_MODULE_SPECIFIER.to_string()),
        ),
        script_entry: Some(entry),
    })
}

fn read_runtime_manifest(entry_dir: &Path) -> Result<Option<RuntimeManifest>, StartupError> {
    let manifest_path = entry_dir.join(RUNTIME_MANIFEST_FILE);
    let raw = match fs::read_to_string(&manifest_path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(error) => {
            return Err(StartupError::InvalidLaunchConfig(format!(
                "failed to read runtime manifest {}: {error}",
                manifest_path.display()
            )));
        }
    };
    serde_json::from_str(&raw).map(Some).map_err(|error| {
        StartupError::InvalidLaunchConfig(format!(
            "failed to parse runtime manifest {}: {error}",
            manifest_path.display()
        ))
    })
}

fn parent_or_self(path: &Path) -> PathBuf {
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().expect("fixture path has a parent"))
            .expect("create fixture dir");
        fs::write(path, b"// fixture").expect("write fixture");
    }

    fn test_config() -> DesktopConfig {
        DesktopConfig::from_lookup(|_| None)
    }

    #[test]
    fn locate_backend_entry_returns_first_existing_candidate() {
        let temp = tempfile::tempdir().expect("tempdir");
        let candidates = vec![
            temp.path().join("a").join("missing.js"),
            temp.path().join("b").join("missing.js"),
            temp.path().join("c").join("exists.js"),
        ];
        touch(&candidates[2]);

        assert_eq!(locate_backend_entry(&candidates), Some(candidates[2].clone()));
    }

    #[test]
    fn locate_backend_entry_prefers_earlier_candidate_over_later_literal() {
        let temp = tempfile::tempdir().expect("tempdir");
        let first = temp.path().join("one").join("index.js");
        let second = temp.path().join("two").join("index.js");
        touch(&first.with_extension("cjs"));
        touch(&second);

        assert_eq!(
            locate_backend_entry(&[first.clone(), second]),
            Some(first.with_extension("cjs"))
        );
    }

    #[test]
    fn locate_backend_entry_tries_mjs_before_cjs() {
        let temp = tempfile::tempdir().expect("tempdir");
        let candidate = temp.path().join("dist").join("index.js");
        touch(&candidate.with_extension("mjs"));
        touch(&candidate.with_extension("cjs"));

        assert_eq!(
            locate_backend_entry(&[candidate.clone()]),
            Some(candidate.with_extension("mjs"))
        );
    }

    #[test]
    fn locate_backend_fails_with_every_attempted_path() {
        let temp = tempfile::tempdir().expect("tempdir");
        let entry = temp.path().join("dist").join("index.js");
        let exe = temp.path().join("rest-express");

        let error = locate_backend(&[entry.clone()], &[exe.clone()], None)
            .expect_err("nothing exists");
        match error {
            StartupError::EntryNotFound { attempted } => {
                assert_eq!(
                    attempted,
                    vec![
                        entry.clone(),
                        entry.with_extension("mjs"),
                        entry.with_extension("cjs"),
                        exe
                    ]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn standalone_fallback_never_returns_running_executable() {
        let temp = tempfile::tempdir().expect("tempdir");
        let running = temp.path().join("bin").join("rest-express");
        touch(&running);
        let via_parent = temp
            .path()
            .join("bin")
            .join("resources")
            .join("..")
            .join("rest-express");
        fs::create_dir_all(temp.path().join("bin").join("resources")).expect("resources dir");

        assert_eq!(
            locate_standalone_executable(&[running.clone(), via_parent], Some(&running)),
            None
        );
    }

    #[test]
    fn standalone_fallback_skips_self_and_returns_next_candidate() {
        let temp = tempfile::tempdir().expect("tempdir");
        let running = temp.path().join("bin").join("wanderagent");
        let server = temp.path().join("bin").join("rest-express");
        touch(&running);
        touch(&server);

        let found =
            locate_standalone_executable(&[running.clone(), server.clone()], Some(&running));
        assert_eq!(found, Some(server.canonicalize().expect("canonical")));
    }

    #[test]
    fn locate_backend_falls_back_to_standalone_executable() {
        let temp = tempfile::tempdir().expect("tempdir");
        let server = temp.path().join("rest-express");
        touch(&server);

        let entry = temp.path().join("dist").join("index.js");
        let located =
            locate_backend(&[entry], &[server.clone()], None).expect("server executable");
        assert_eq!(
            located,
            LocatedBackend::Executable(server.canonicalize().expect("canonical"))
        );
    }

    #[test]
    fn script_launch_uses_manifest_runtime_and_host_module() {
        let temp = tempfile::tempdir().expect("tempdir");
        let entry = temp.path().join("dist").join("index.js");
        touch(&entry);
        fs::write(
            temp.path().join("dist").join(RUNTIME_MANIFEST_FILE),
            r#"{"runtime":"bin/node","hostModule":"wanderagent:host"}"#,
        )
        .expect("write manifest");

        let plan = resolve_script_launch(&test_config(), entry.clone()).expect("plan");
        assert_eq!(
            plan.cmd,
            temp.path().join("dist").join("bin/node").to_string_lossy()
        );
        assert_eq!(plan.args, vec![entry.to_string_lossy().to_string()]);
        assert_eq!(plan.cwd, temp.path());
        assert_eq!(plan.host_module.as_deref(), Some("wanderagent:host"));
    }

    #[test]
    fn script_launch_rejects_malformed_manifest() {
        let temp = tempfile::tempdir().expect("tempdir");
        let entry = temp.path().join("dist").join("index.js");
        touch(&entry);
        fs::write(temp.path().join("dist").join(RUNTIME_MANIFEST_FILE), "{not json")
            .expect("write manifest");

        let error = resolve_script_launch(&test_config(), entry).expect_err("bad manifest");
        assert!(matches!(error, StartupError::InvalidLaunchConfig(_)));
    }

    #[test]
    fn custom_command_is_split_like_a_shell() {
        let mut config = test_config();
        config.backend_cwd = Some(PathBuf::from("/srv/app"));
        let plan = resolve_custom_launch(&config, "npm run 'dev server'").expect("plan");
        assert_eq!(plan.cmd, "npm");
        assert_eq!(plan.args, vec!["run".to_string(), "dev server".to_string()]);
        assert_eq!(plan.cwd, PathBuf::from("/srv/app"));
        assert!(resolve_custom_launch(&config, "   ").is_err());
    }

    #[test]
    fn with_script_entry_rewrites_the_entry_argument() {
        let plan = LaunchPlan {
            cmd: "node".to_string(),
            args: vec!["--enable-source-maps".to_string(), "/app/dist/index.js".to_string()],
            cwd: PathBuf::from("/app"),
            script_entry: Some(PathBuf::from("/app/dist/index.js")),
            host_module: None,
        };
        let rewritten = plan.with_script_entry(Path::new("/tmp/main.mjs"));
        assert_eq!(
            rewritten.args,
            vec!["--enable-source-maps".to_string(), "/tmp/main.mjs".to_string()]
        );
        assert_eq!(build_debug_command(&rewritten)[0], "node");
    }
}
