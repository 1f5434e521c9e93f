//! Static file serving for the built site.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use log::debug;
use percent_encoding::percent_decode_str;
use tower::ServiceExt;
use tower_http::services::ServeFile;

/// Page served with status 404 for unknown paths, when the site has one.
pub const NOT_FOUND_PAGE: &str = "404.html";

/// Serves files below `root`. There are no other routes and no directory
/// listings.
pub fn router(root: PathBuf) -> Router {
    Router::new().fallback(serve).with_state(Arc::new(root))
}

async fn serve(State(root): State<Arc<PathBuf>>, req: Request) -> Response {
    let Some(file) = resolve(&root, req.uri().path()).await else {
        debug!("Not found: {}", req.uri().path());
        return not_found(&root).await;
    };

    match ServeFile::new(file).oneshot(req).await {
        Ok(res) => res.into_response(),
        Err(e) => match e {},
    }
}

/// Maps a request path to a file under `root`.
///
/// `path` is the percent-encoded request path. `/name` prefers `name.html`;
/// a directory resolves to its `index.html`. Paths that are not UTF-8 once
/// decoded, or that climb out of `root`, resolve to nothing.
pub async fn resolve(root: &Path, path: &str) -> Option<PathBuf> {
    let decoded = percent_decode_str(path).decode_utf8().ok()?;
    let relative = decoded.trim_start_matches('/');
    if relative.split(['/', '\\']).any(|segment| segment == "..") {
        return None;
    }

    if !relative.is_empty() && !relative.ends_with('/') {
        let html = root.join(format!("{relative}.html"));
        if is_file(&html).await {
            return Some(html);
        }
    }

    let target = root.join(relative);
    let meta = tokio::fs::metadata(&target).await.ok()?;
    if meta.is_file() {
        return Some(target);
    }
    if meta.is_dir() {
        let index = target.join("index.html");
        if is_file(&index).await {
            return Some(index);
        }
    }
    None
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.is_file())
}

async fn not_found(root: &Path) -> Response {
    match tokio::fs::read(root.join(NOT_FOUND_PAGE)).await {
        Ok(body) => (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "404 page not found\n").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use std::fs;

    fn site() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("index.html"), "<p>home</p>").unwrap();
        fs::write(root.join("404.html"), "<p>lost</p>").unwrap();
        fs::write(root.join("watched.html"), "<p>watched</p>").unwrap();
        fs::create_dir_all(root.join("about")).unwrap();
        fs::write(root.join("about/index.html"), "<p>about</p>").unwrap();
        fs::create_dir_all(root.join("icons")).unwrap();
        fs::write(root.join("icons/sprite.svg"), "<svg></svg>").unwrap();
        fs::write(root.join("style.css"), "p{}").unwrap();
        dir
    }

    async fn get(root: &Path, uri: &str) -> (StatusCode, Option<String>, String) {
        let res = router(root.to_path_buf())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let content_type = res
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_serves_index() {
        let dir = site();
        let (status, content_type, body) = get(dir.path(), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(content_type.unwrap().starts_with("text/html"));
        assert_eq!(body, "<p>home</p>");
    }

    #[tokio::test]
    async fn test_serves_html_without_extension() {
        let dir = site();
        let (status, _, body) = get(dir.path(), "/watched").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<p>watched</p>");

        let (status, _, body) = get(dir.path(), "/watched.html").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<p>watched</p>");
    }

    #[tokio::test]
    async fn test_serves_directory_index() {
        let dir = site();
        let (status, _, body) = get(dir.path(), "/about").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<p>about</p>");

        let (status, _, body) = get(dir.path(), "/about/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<p>about</p>");
    }

    #[tokio::test]
    async fn test_serves_static_with_content_type() {
        let dir = site();
        let (status, content_type, _) = get(dir.path(), "/style.css").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("text/css"));
    }

    #[tokio::test]
    async fn test_not_found_page() {
        let dir = site();
        let (status, content_type, body) = get(dir.path(), "/does-not-exist").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(content_type.unwrap().starts_with("text/html"));
        assert_eq!(body, "<p>lost</p>");

        // The 404 page itself is an ordinary page.
        let (status, _, _) = get(dir.path(), "/404").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_no_directory_listing() {
        let dir = site();
        let (status, _, body) = get(dir.path(), "/icons/").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(!body.contains("sprite.svg"));
    }

    #[tokio::test]
    async fn test_plain_not_found_without_page() {
        let dir = tempfile::tempdir().unwrap();
        let (status, _, body) = get(dir.path(), "/missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "404 page not found\n");
    }

    #[tokio::test]
    async fn test_serves_encoded_paths() {
        let dir = site();
        let root = dir.path();
        fs::create_dir_all(root.join("hello world")).unwrap();
        fs::write(root.join("hello world/index.html"), "<p>spaced</p>").unwrap();
        fs::create_dir_all(root.join("café")).unwrap();
        fs::write(root.join("café/index.html"), "<p>café</p>").unwrap();

        let (status, _, body) = get(root, "/hello%20world").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<p>spaced</p>");

        let (status, _, body) = get(root, "/caf%C3%A9/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<p>café</p>");

        let (status, _, _) = get(root, "/caf%FF").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_rejects_traversal() {
        let dir = site();
        let root = dir.path().join("about");
        assert_eq!(resolve(&root, "/../index.html").await, None);
        assert_eq!(resolve(&root, "/a/../../404.html").await, None);
        assert_eq!(resolve(&root, "/%2e%2e/index.html").await, None);
        assert_eq!(resolve(&root, "/..%2F404.html").await, None);
        assert_eq!(resolve(&root, "/").await, Some(root.join("index.html")));
    }
}
