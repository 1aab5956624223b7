use std::path::{Path, PathBuf};

use url::Url;

use crate::{
    runtime_paths::{ArtifactKind, RuntimeLayout},
    ExecutionMode, StartupError, STATIC_ASSET_SCHEME,
};

/// How a resolved static index is handed to the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetProtocol {
    /// Plain `file://` URL; used by the headless runner.
    FileUrl,
    /// Served by the desktop shell's custom URI scheme, rooted at the index's directory.
    AppScheme,
}

/// What the main window should display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowLoadTarget {
    Network { port: u16 },
    StaticAsset {
        index_path: PathBuf,
        protocol: AssetProtocol,
    },
}

impl WindowLoadTarget {
    pub fn network(port: u16) -> Self {
        Self::Network { port }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// URL to navigate to, or `None` when a static index cannot be expressed as one.
    pub fn location(&self) -> Option<Url> {
        match self {
            Self::Network { port } => Url::parse(&network_url(*port)).ok(),
            Self::StaticAsset {
                index_path,
                protocol: AssetProtocol::FileUrl,
            } => Url::from_file_path(index_path).ok(),
            Self::StaticAsset {
                protocol: AssetProtocol::AppScheme,
                ..
            } => Url::parse(&app_scheme_index_url()).ok(),
        }
    }

    pub fn static_root(&self) -> Option<&Path> {
        match self {
            Self::StaticAsset { index_path, .. } => index_path.parent(),
            Self::Network { .. } => None,
        }
    }
}

impl std::fmt::Display for WindowLoadTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network { port } => f.write_str(&network_url(*port)),
            Self::StaticAsset { index_path, .. } => write!(f, "{}", index_path.display()),
        }
    }
}

pub fn network_url(port: u16) -> String {
    format!("http://localhost:{port}/")
}

// Webviews on these platforms only expose custom schemes through an http host.
#[cfg(any(target_os = "windows", target_os = "android"))]
pub fn app_scheme_index_url() -> String {
    format!("http://{STATIC_ASSET_SCHEME}.localhost/index.html")
}

#[cfg(not(any(target_os = "windows", target_os = "android")))]
pub fn app_scheme_index_url() -> String {
    format!("{STATIC_ASSET_SCHEME}://localhost/index.html")
}

/// First existing static index among `candidates`; every miss is reported in the error.
pub fn resolve_static_index(candidates: &[PathBuf]) -> Result<PathBuf, StartupError> {
    for candidate in candidates {
        if candidate.is_file() {
            tracing::info!(path = %candidate.display(), "[+] static index found");
            return Ok(candidate.clone());
        }
        tracing::debug!(path = %candidate.display(), "[-] static index missing");
    }
    tracing::warn!(attempts = candidates.len(), "no static index found");
    Err(StartupError::AssetNotFound {
        attempted: candidates.to_vec(),
    })
}

pub fn resolve_static_target(
    layout: &RuntimeLayout,
    protocol: AssetProtocol,
) -> Result<WindowLoadTarget, StartupError> {
    let index_path = resolve_static_index(&layout.candidates(ArtifactKind::StaticIndex))?;
    Ok(WindowLoadTarget::StaticAsset {
        index_path,
        protocol,
    })
}

/// Initial target for `mode`. Networked targets are only valid once the backend is ready.
pub fn resolve_window_target(
    mode: ExecutionMode,
    port: u16,
    layout: &RuntimeLayout,
    protocol: AssetProtocol,
) -> Result<WindowLoadTarget, StartupError> {
    match mode {
        ExecutionMode::Dev | ExecutionMode::ProductionNetworked => {
            Ok(WindowLoadTarget::network(port))
        }
        ExecutionMode::ProductionServerless => resolve_static_target(layout, protocol),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout_with_app_dir(root: &Path) -> RuntimeLayout {
        RuntimeLayout {
            app_dir: Some(root.join("app")),
            resources_dir: Some(root.to_path_buf()),
            ..RuntimeLayout::default()
        }
    }

    #[test]
    fn network_target_points_at_localhost_port() {
        let target = WindowLoadTarget::network(5000);
        assert!(target.is_network());
        assert_eq!(
            target.location().map(|url| url.to_string()),
            Some("http://localhost:5000/".to_string())
        );
        assert_eq!(target.to_string(), "http://localhost:5000/");
        assert_eq!(target.static_root(), None);
    }

    #[test]
    fn first_existing_candidate_wins() {
        let temp = tempfile::tempdir().expect("tempdir");
        let existing = temp.path().join("c").join("index.html");
        std::fs::create_dir_all(existing.parent().expect("parent")).expect("mkdir");
        std::fs::write(&existing, "<html></html>").expect("write");
        let later = temp.path().join("d.html");
        std::fs::write(&later, "").expect("write");

        let candidates = vec![
            temp.path().join("a").join("index.html"),
            temp.path().join("b").join("index.html"),
            existing.clone(),
            later,
        ];
        assert_eq!(resolve_static_index(&candidates).expect("found"), existing);
    }

    #[test]
    fn all_missing_reports_every_attempt() {
        let temp = tempfile::tempdir().expect("tempdir");
        let candidates = vec![temp.path().join("a.html"), temp.path().join("b.html")];
        match resolve_static_index(&candidates) {
            Err(StartupError::AssetNotFound { attempted }) => assert_eq!(attempted, candidates),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn serverless_mode_resolves_from_layout_table() {
        let temp = tempfile::tempdir().expect("tempdir");
        let index = temp.path().join("app").join("dist").join("public").join("index.html");
        std::fs::create_dir_all(index.parent().expect("parent")).expect("mkdir");
        std::fs::write(&index, "<html></html>").expect("write");

        let target = resolve_window_target(
            ExecutionMode::ProductionServerless,
            5000,
            &layout_with_app_dir(temp.path()),
            AssetProtocol::FileUrl,
        )
        .expect("static target");

        assert_eq!(target.static_root(), index.parent());
        let location = target.location().expect("file url");
        assert_eq!(location.scheme(), "file");
    }

    #[test]
    fn app_scheme_location_uses_the_static_scheme() {
        let target = WindowLoadTarget::StaticAsset {
            index_path: PathBuf::from("/opt/app/dist/public/index.html"),
            protocol: AssetProtocol::AppScheme,
        };
        let location = target.location().expect("scheme url").to_string();
        assert!(location.contains(STATIC_ASSET_SCHEME));
        assert!(location.ends_with("/index.html"));
    }

    #[test]
    fn networked_modes_never_touch_the_filesystem() {
        let layout = RuntimeLayout::default();
        for mode in [ExecutionMode::Dev, ExecutionMode::ProductionNetworked] {
            let target =
                resolve_window_target(mode, 5123, &layout, AssetProtocol::FileUrl).expect("net");
            assert_eq!(target, WindowLoadTarget::network(5123));
        }
    }
}
