use std::{
    path::{Component, Path, PathBuf},
    sync::{Mutex, PoisonError},
};

const INDEX_FILE: &str = "index.html";

/// Directory served by the static asset scheme; empty until a static target is loaded.
#[derive(Debug, Default)]
pub struct StaticAssetRoot {
    root: Mutex<Option<PathBuf>>,
}

impl StaticAssetRoot {
    pub fn set(&self, root: PathBuf) {
        *self.root.lock().unwrap_or_else(PoisonError::into_inner) = Some(root);
    }

    pub fn get(&self) -> Option<PathBuf> {
        self.root
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Maps a request path onto a file below `root`.
///
/// Paths escaping the root are rejected. Extensionless paths that do not exist fall back to the
/// index so client-side routes resolve.
pub fn resolve_request_path(root: &Path, request_path: &str) -> Option<PathBuf> {
    let trimmed = request_path
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_start_matches('/');
    let relative = if trimmed.is_empty() { INDEX_FILE } else { trimmed };

    let mut resolved = root.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(segment) => resolved.push(segment),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if resolved.is_file() {
        return Some(resolved);
    }
    if resolved.is_dir() {
        let index = resolved.join(INDEX_FILE);
        return index.is_file().then_some(index);
    }
    if resolved.extension().is_none() {
        let index = root.join(INDEX_FILE);
        return index.is_file().then_some(index);
    }
    None
}

pub fn mime_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "js" | "mjs" | "cjs" => "text/javascript; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "json" | "map" => "application/json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "wasm" => "application/wasm",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
