//! Static file serving for the embedded UI
//!
//! The page under frontend/ is compiled into the binary with rust-embed, so
//! the server ships as a single executable.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
};
use rust_embed::Embed;

#[derive(Embed)]
#[folder = "frontend/"]
struct FrontendAssets;

/// Serve embedded static files
/// Returns the file if found, or falls back to index.html for SPA routing
pub async fn serve_static(req: Request<Body>) -> Response {
    let path = req.uri().path().trim_start_matches('/');
    let path = if path.is_empty() { "index.html" } else { path };

    if let Some(response) = serve_file(path) {
        return response;
    }

    // Unknown API paths should not turn into HTML
    if !path.starts_with("api/") && (!path.contains('.') || path.ends_with(".html")) {
        if let Some(response) = serve_file("index.html") {
            return response;
        }
    }

    (StatusCode::NOT_FOUND, "Not found").into_response()
}

fn serve_file(path: &str) -> Option<Response> {
    let file = FrontendAssets::get(path)?;
    let mime_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string();

    Some(
        (
            [
                (header::CONTENT_TYPE, mime_type),
                (
                    header::CACHE_CONTROL,
                    "public, max-age=0, must-revalidate".to_string(),
                ),
            ],
            file.data.into_owned(),
        )
            .into_response(),
    )
}
