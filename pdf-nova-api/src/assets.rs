//! Front end files compiled into the binary
//!
//! A configured `static_dir` takes precedence; it is served with
//! `tower_http::services::ServeDir` by the router.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
};

use crate::state::AppState;

const INDEX_HTML: &str = include_str!("../static/index.html");
const APP_JS: &str = include_str!("../static/app.js");
const STYLES_CSS: &str = include_str!("../static/styles.css");

/// Embedded asset by file name, with its content type
pub fn embedded(file: &str) -> Option<(&'static str, &'static str)> {
    match file {
        "index.html" => Some(("text/html; charset=utf-8", INDEX_HTML)),
        "app.js" => Some(("text/javascript; charset=utf-8", APP_JS)),
        "styles.css" => Some(("text/css; charset=utf-8", STYLES_CSS)),
        _ => None,
    }
}

/// `GET /`
pub async fn index(State(state): State<AppState>) -> Response {
    if let Some(dir) = &state.config.static_dir {
        match tokio::fs::read_to_string(dir.join("index.html")).await {
            Ok(html) => return Html(html).into_response(),
            Err(e) => tracing::debug!(error = %e, "no index.html in static dir, using embedded"),
        }
    }
    Html(INDEX_HTML).into_response()
}

/// `GET /static/{*file}` when no static dir is configured
pub async fn static_file(Path(file): Path<String>) -> Response {
    match embedded(&file) {
        Some((content_type, body)) => (
            [
                (header::CONTENT_TYPE, content_type),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            body,
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_assets() {
        let (kind, body) = embedded("app.js").unwrap();
        assert!(kind.starts_with("text/javascript"));
        assert!(body.contains("/api/tools"));
        assert!(embedded("index.html").unwrap().1.contains("app.js"));
        assert!(embedded("../Cargo.toml").is_none());
    }
}
