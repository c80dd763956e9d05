//! Fallback for requests the static-file service cannot satisfy.
//!
//! A request that reaches this handler was not a servable file: either the
//! path names a directory without an index file, or nothing exists there at
//! all. Directories get a generated HTML listing (when enabled); everything
//! else is a plain 404. The static-file service has its own path
//! resolution, so this module only re-implements the little the fallback
//! needs: percent-decoding plus a traversal-safe join under the root.

use std::path::{Path, PathBuf};

use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};

#[derive(Clone)]
pub struct ListingState {
    pub root: PathBuf,
    pub enabled: bool,
}

pub async fn fallback(State(state): State<ListingState>, uri: Uri) -> Response {
    if !state.enabled {
        return not_found();
    }
    let Some(dir) = resolve_dir(&state.root, uri.path()) else {
        return not_found();
    };
    match render_listing(&dir, uri.path()).await {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::warn!("cannot list {}: {}", dir.display(), e);
            not_found()
        }
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "404 Not Found").into_response()
}

/// Map a request path to an existing directory under `root`.
///
/// Rejects `..`, NUL bytes and anything that is not a directory. Empty and
/// `.` components are skipped, so `/`, `//` and `/./` all land on the root.
fn resolve_dir(root: &Path, request_path: &str) -> Option<PathBuf> {
    let decoded = percent_decode(request_path);
    let mut dir = root.to_path_buf();
    for component in decoded.split('/') {
        match component {
            "" | "." => continue,
            ".." => return None,
            comp if comp.contains('\0') => return None,
            comp => dir.push(comp),
        }
    }
    dir.is_dir().then_some(dir)
}

async fn render_listing(dir: &Path, request_path: &str) -> std::io::Result<String> {
    let mut entries = Vec::new();
    let mut reader = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = reader.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_dir = entry
            .file_type()
            .await
            .map(|kind| kind.is_dir())
            .unwrap_or(false);
        entries.push((name, is_dir));
    }
    // Directories first, then lexicographic.
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let title = html_escape(request_path);
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\">");
    html.push_str(&format!("<title>Index of {title}</title></head>\n<body>\n"));
    html.push_str(&format!("<h1>Index of {title}</h1>\n<hr>\n<ul>\n"));
    if request_path != "/" {
        html.push_str("<li><a href=\"../\">../</a></li>\n");
    }
    for (name, is_dir) in &entries {
        let suffix = if *is_dir { "/" } else { "" };
        html.push_str(&format!(
            "<li><a href=\"{href}{suffix}\">{label}{suffix}</a></li>\n",
            href = percent_encode(name),
            label = html_escape(name),
        ));
    }
    html.push_str("</ul>\n<hr>\n</body>\n</html>\n");
    Ok(html)
}

fn percent_decode(input: &str) -> String {
    let raw = input.as_bytes();
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'%' && i + 2 < raw.len() {
            let hi = (raw[i + 1] as char).to_digit(16);
            let lo = (raw[i + 2] as char).to_digit(16);
            if let (Some(hi), Some(lo)) = (hi, lo) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(raw[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn percent_encode(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
