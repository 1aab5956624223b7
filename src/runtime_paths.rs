use std::{
    env,
    path::{Component, Path, PathBuf},
};

use crate::{DesktopConfig, PACKAGED_ROOT_DIR_NAME, SERVER_EXECUTABLE_STEM};

/// Directory a candidate path template is anchored at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutRoot {
    ExecutableDir,
    ResourcesDir,
    AppDir,
    DevRoot,
    WorkingDir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    BackendEntry,
    StandaloneExecutable,
    StaticIndex,
}

#[derive(Debug, Clone, Copy)]
pub struct PathTemplate {
    pub root: LayoutRoot,
    pub segments: &'static [&'static str],
}

const fn template(root: LayoutRoot, segments: &'static [&'static str]) -> PathTemplate {
    PathTemplate { root, segments }
}

// New packaging layouts are added here; order is search order.
const BACKEND_ENTRY_TEMPLATES: &[PathTemplate] = &[
    template(LayoutRoot::AppDir, &["dist", "index.js"]),
    template(LayoutRoot::ResourcesDir, &["dist", "index.js"]),
    template(LayoutRoot::ResourcesDir, &["app.asar", "dist", "index.js"]),
    template(LayoutRoot::ExecutableDir, &["dist", "index.js"]),
    template(LayoutRoot::DevRoot, &["dist", "index.js"]),
    template(LayoutRoot::WorkingDir, &["dist", "index.js"]),
];

const STANDALONE_EXECUTABLE_TEMPLATES: &[PathTemplate] = &[
    template(LayoutRoot::ExecutableDir, &[SERVER_EXECUTABLE_STEM]),
    template(LayoutRoot::ResourcesDir, &["..", SERVER_EXECUTABLE_STEM]),
    template(LayoutRoot::AppDir, &["..", SERVER_EXECUTABLE_STEM]),
];

const STATIC_INDEX_TEMPLATES: &[PathTemplate] = &[
    template(LayoutRoot::AppDir, &["dist", "public", "index.html"]),
    template(LayoutRoot::AppDir, &["dist", "index.html"]),
    template(LayoutRoot::ResourcesDir, &["app.asar", "dist", "public", "index.html"]),
    template(LayoutRoot::ResourcesDir, &["app.asar", "dist", "index.html"]),
    template(LayoutRoot::ResourcesDir, &["dist", "public", "index.html"]),
    template(LayoutRoot::ResourcesDir, &["dist", "index.html"]),
    template(LayoutRoot::ExecutableDir, &["dist", "public", "index.html"]),
    template(LayoutRoot::DevRoot, &["dist", "public", "index.html"]),
    template(LayoutRoot::DevRoot, &["dist", "index.html"]),
];

pub fn templates_for(kind: ArtifactKind) -> &'static [PathTemplate] {
    match kind {
        ArtifactKind::BackendEntry => BACKEND_ENTRY_TEMPLATES,
        ArtifactKind::StandaloneExecutable => STANDALONE_EXECUTABLE_TEMPLATES,
        ArtifactKind::StaticIndex => STATIC_INDEX_TEMPLATES,
    }
}

/// Concrete directories of the running build, used to expand path templates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeLayout {
    pub executable: Option<PathBuf>,
    pub executable_dir: Option<PathBuf>,
    pub resources_dir: Option<PathBuf>,
    pub app_dir: Option<PathBuf>,
    pub dev_root: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
}

impl RuntimeLayout {
    pub fn detect(config: &DesktopConfig) -> Self {
        let executable = env::current_exe().ok();
        let executable_dir = executable
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf);
        let resources_dir = config
            .resources_dir
            .clone()
            .or_else(|| executable_dir.as_deref().map(default_resources_dir));

        Self {
            executable,
            executable_dir,
            app_dir: resources_dir.as_ref().map(|dir| dir.join("app")),
            resources_dir,
            dev_root: config.dev_root.clone().or_else(|| Some(dev_tree_root())),
            working_dir: env::current_dir().ok(),
        }
    }

    /// Replaces the resources directory with the one reported by the window host.
    pub fn with_resources_dir(mut self, resources_dir: PathBuf) -> Self {
        self.app_dir = Some(resources_dir.join("app"));
        self.resources_dir = Some(resources_dir);
        self
    }

    pub fn root(&self, root: LayoutRoot) -> Option<&Path> {
        match root {
            LayoutRoot::ExecutableDir => self.executable_dir.as_deref(),
            LayoutRoot::ResourcesDir => self.resources_dir.as_deref(),
            LayoutRoot::AppDir => self.app_dir.as_deref(),
            LayoutRoot::DevRoot => self.dev_root.as_deref(),
            LayoutRoot::WorkingDir => self.working_dir.as_deref(),
        }
    }

    /// Expands the template table for `kind` into an ordered candidate list.
    pub fn candidates(&self, kind: ArtifactKind) -> Vec<PathBuf> {
        templates_for(kind)
            .iter()
            .filter_map(|template| {
                let base = self.root(template.root)?;
                let mut path = template
                    .segments
                    .iter()
                    .fold(base.to_path_buf(), |path, segment| path.join(segment));
                if kind == ArtifactKind::StandaloneExecutable {
                    path.as_mut_os_string().push(env::consts::EXE_SUFFIX);
                }
                Some(path)
            })
            .collect()
    }
}

#[cfg(target_os = "macos")]
fn default_resources_dir(executable_dir: &Path) -> PathBuf {
    executable_dir.join("..").join("Resources")
}

#[cfg(not(target_os = "macos"))]
fn default_resources_dir(executable_dir: &Path) -> PathBuf {
    executable_dir.join("resources")
}

fn dev_tree_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

pub fn default_packaged_root_dir() -> Option<PathBuf> {
    home::home_dir().map(|home| home.join(PACKAGED_ROOT_DIR_NAME))
}

/// Absolute form of `path` with `.` and `..` folded; symlinks resolved when the path exists.
pub fn resolve_absolute(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    normalize_lexically(&absolute)
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}
