//! Static file serving using rust-embed.
//!
//! The browser page, its script and stylesheet are embedded in the binary
//! at compile time.

use std::path::Path;

use axum::{
    body::Body,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use rust_embed::RustEmbed;

use super::error::ApiError;

/// Embedded static assets for the browser page.
#[derive(RustEmbed)]
#[folder = "src/web/assets/"]
#[include = "*.html"]
#[include = "*.js"]
#[include = "*.css"]
pub struct Assets;

const CURRENT_DIR_PLACEHOLDER: &str = "{{current_dir}}";
const ROOT_DIR_PLACEHOLDER: &str = "{{root_dir}}";

/// Serve a static file from embedded assets, keyed by request path.
pub async fn serve_static(uri: Uri) -> impl IntoResponse {
    serve_file(uri.path().trim_start_matches('/'))
}

/// Render the browser page with the current and root directories filled in.
#[must_use]
pub fn render_index(current: &Path, root: &Path) -> Option<String> {
    let content = Assets::get("index.html")?;
    let template = String::from_utf8_lossy(&content.data);
    Some(
        template
            .replace(CURRENT_DIR_PLACEHOLDER, &escape_html(&current.display().to_string()))
            .replace(ROOT_DIR_PLACEHOLDER, &escape_html(&root.display().to_string())),
    )
}

fn serve_file(path: &str) -> Response {
    let Some(content) = Assets::get(path) else {
        return ApiError::not_found("Not found").into_response();
    };

    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let mut response = Body::from(content.data.into_owned()).into_response();
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    if let Ok(value) = mime.as_ref().parse() {
        headers.insert(header::CONTENT_TYPE, value);
    }
    headers.insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static(cache_control_for(path)),
    );
    response
}

/// Check if path has a specific extension (case-insensitive).
fn has_extension(path: &str, ext: &str) -> bool {
    Path::new(path)
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Get appropriate cache-control header for a file type.
fn cache_control_for(path: &str) -> &'static str {
    if has_extension(path, "html") {
        "no-cache, no-store, must-revalidate"
    } else {
        "public, max-age=3600"
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
