//! HTTP surface: a health check plus the static site.

use axum::{Router, routing::get};
use std::path::Path;
use tower_http::services::ServeDir;

async fn healthz() -> &'static str {
    "ok"
}

/// Builds the router. Paths other than `/healthz` are served from `static_dir`.
pub fn router(static_dir: impl AsRef<Path>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .fallback_service(ServeDir::new(static_dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn get_path(app: Router, path: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::get(path).body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[tokio::test]
    async fn healthz_reports_ok() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (status, body) = get_path(router(dir.path()), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn serves_static_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("index.html"), "<h1>chatdeck</h1>").expect("write");

        let (status, body) = get_path(router(dir.path()), "/index.html").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<h1>chatdeck</h1>");
    }

    #[tokio::test]
    async fn missing_files_are_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (status, _) = get_path(router(dir.path()), "/nope.txt").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
