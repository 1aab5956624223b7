use std::path::PathBuf;

const STATIC_ASSET_DIR_HINT: &str = "dist/public";

/// Why the window ended on a diagnostic page instead of the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    PackagedAssetsMissing { attempted: Vec<PathBuf> },
    BackendUnreachable { url: String, reason: String },
}

/// Self-contained HTML shown in place of the application UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticPage {
    pub kind: DiagnosticKind,
    pub title: String,
    pub body_html: String,
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

impl DiagnosticPage {
    pub fn packaged_assets_missing(attempted: &[PathBuf]) -> Self {
        let mut body = String::from(
            "<p>The application UI could not be found in this build.</p>\
             <p>Rebuild the package with the <code>",
        );
        body.push_str(STATIC_ASSET_DIR_HINT);
        body.push_str(
            "</code> directory included in the bundled resources, then reinstall.</p>",
        );
        if !attempted.is_empty() {
            body.push_str("<p>Searched locations:</p><ul>");
            for path in attempted {
                body.push_str("<li><code>");
                body.push_str(&escape_html(&path.display().to_string()));
                body.push_str("</code></li>");
            }
            body.push_str("</ul>");
        }

        Self {
            kind: DiagnosticKind::PackagedAssetsMissing {
                attempted: attempted.to_vec(),
            },
            title: "Packaged assets missing".to_string(),
            body_html: body,
        }
    }

    pub fn backend_unreachable(url: &str, reason: &str) -> Self {
        let body_html = format!(
            "<p>The local backend at <code>{}</code> could not be reached.</p><p>{}</p>",
            escape_html(url),
            escape_html(reason)
        );
        Self {
            kind: DiagnosticKind::BackendUnreachable {
                url: url.to_string(),
                reason: reason.to_string(),
            },
            title: "Backend unreachable".to_string(),
            body_html,
        }
    }

    pub fn to_document(&self) -> String {
        let title = escape_html(&self.title);
        format!(
            "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{title}</title>\
             <style>body{{font-family:system-ui,sans-serif;margin:3rem;color:#222}}\
             code{{background:#f3f3f3;padding:0 .25rem}}</style></head>\
             <body><h1>{title}</h1>{}</body></html>",
            self.body_html
        )
    }

    /// Script that replaces the current document with this page.
    pub fn to_injection_script(&self) -> String {
        let document =
            serde_json::to_string(&self.to_document()).unwrap_or_else(|_| "\"\"".to_string());
        format!("document.open();document.write({document});document.close();")
    }
}
