//! Router assembly and the serve loop.
//!
//! File semantics (content types, ranges, 404s, method handling) come from
//! the static-file service; nothing here re-decides them. This module only
//! wires the pieces together: static files, the listing fallback, CORS
//! stamping, request traces, and shutdown on an external signal.

use anyhow::Result;
use axum::Router;
use axum::routing::any;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::ServeSettings;
use crate::cors;
use crate::listing::{self, ListingState};

/// Static-file router rooted at the configured directory.
pub fn build_router(settings: &ServeSettings) -> Router {
    let state = ListingState {
        root: settings.root.clone(),
        enabled: settings.dir_listings,
    };
    let static_files = ServeDir::new(&settings.root)
        .append_index_html_on_directories(true)
        .fallback(any(listing::fallback).with_state(state));
    let router = Router::new()
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http());
    cors::apply(router)
}

/// Run the accept loop until Ctrl-C (or SIGTERM on unix), then drain and
/// release the listener.
pub async fn serve(listener: tokio::net::TcpListener, router: Router) -> Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
    }
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::path::Path;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn spawn_server(root: &Path, dir_listings: bool) -> SocketAddr {
        let settings = ServeSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            root: root.to_path_buf(),
            dir_listings,
            open_browser: false,
        };
        let router = build_router(&settings);
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0))
            .await
            .expect("bind ephemeral");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve");
        });
        addr
    }

    /// One raw HTTP/1.1 exchange; `Connection: close` so the read drains.
    async fn request(addr: SocketAddr, method: &str, path: &str) -> Http {
        let mut stream = tokio::net::TcpStream::connect(addr).await.expect("connect");
        let raw = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(raw.as_bytes()).await.expect("write request");
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.expect("read response");
        parse(&buf)
    }

    struct Http {
        status: u16,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    }

    impl Http {
        fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        }

        fn assert_cors_headers(&self) {
            assert_eq!(self.header("access-control-allow-origin"), Some("*"));
            assert_eq!(
                self.header("access-control-allow-methods"),
                Some("GET, POST, OPTIONS")
            );
            assert_eq!(
                self.header("access-control-allow-headers"),
                Some("Content-Type")
            );
        }
    }

    fn parse(raw: &[u8]) -> Http {
        let end = raw
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .expect("header terminator");
        let head = std::str::from_utf8(&raw[..end]).expect("ascii head");
        let mut lines = head.split("\r\n");
        let status = lines
            .next()
            .and_then(|l| l.split_whitespace().nth(1))
            .and_then(|s| s.parse().ok())
            .expect("status code");
        let headers = lines
            .filter_map(|l| l.split_once(": "))
            .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
            .collect();
        Http {
            status,
            headers,
            body: raw[end + 4..].to_vec(),
        }
    }

    #[tokio::test]
    async fn serves_file_bytes_with_cors_headers() {
        let dir = TempDir::new().expect("tempdir");
        let content = b"<html><body>hello</body></html>";
        std::fs::write(dir.path().join("index.html"), content).expect("write");

        let addr = spawn_server(dir.path(), true).await;
        let res = request(addr, "GET", "/index.html").await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body, content);
        assert_eq!(res.header("content-type"), Some("text/html"));
        res.assert_cors_headers();
    }

    #[tokio::test]
    async fn missing_path_is_404_with_cors_headers() {
        let dir = TempDir::new().expect("tempdir");
        let addr = spawn_server(dir.path(), true).await;

        let res = request(addr, "GET", "/does-not-exist.html").await;
        assert_eq!(res.status, 404);
        res.assert_cors_headers();
    }

    #[tokio::test]
    async fn directory_with_index_serves_the_index() {
        let dir = TempDir::new().expect("tempdir");
        std::fs::write(dir.path().join("index.html"), b"front page").expect("write");

        let addr = spawn_server(dir.path(), true).await;
        let res = request(addr, "GET", "/").await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body, b"front page");
        res.assert_cors_headers();
    }

    #[tokio::test]
    async fn directory_without_index_gets_a_listing() {
        let dir = TempDir::new().expect("tempdir");
        std::fs::create_dir(dir.path().join("assets")).expect("mkdir");
        std::fs::write(dir.path().join("assets/app.js"), b"js").expect("write");

        let addr = spawn_server(dir.path(), true).await;
        let res = request(addr, "GET", "/assets/").await;
        assert_eq!(res.status, 200);
        assert!(res.header("content-type").unwrap_or("").starts_with("text/html"));
        assert!(String::from_utf8_lossy(&res.body).contains("app.js"));
        res.assert_cors_headers();
    }

    #[tokio::test]
    async fn listings_can_be_disabled() {
        let dir = TempDir::new().expect("tempdir");
        std::fs::create_dir(dir.path().join("assets")).expect("mkdir");

        let addr = spawn_server(dir.path(), false).await;
        let res = request(addr, "GET", "/assets/").await;
        assert_eq!(res.status, 404);
        res.assert_cors_headers();
    }

    #[tokio::test]
    async fn head_and_options_carry_cors_headers() {
        let dir = TempDir::new().expect("tempdir");
        std::fs::write(dir.path().join("index.html"), b"x").expect("write");
        let addr = spawn_server(dir.path(), true).await;

        let head = request(addr, "HEAD", "/index.html").await;
        assert_eq!(head.status, 200);
        assert!(head.body.is_empty());
        head.assert_cors_headers();

        // Status is whatever the static-file service decides; the headers
        // are stamped regardless.
        let options = request(addr, "OPTIONS", "/index.html").await;
        options.assert_cors_headers();
    }

    #[tokio::test]
    async fn post_response_keeps_base_status_and_cors_headers() {
        let dir = TempDir::new().expect("tempdir");
        let addr = spawn_server(dir.path(), true).await;

        let res = request(addr, "POST", "/anything").await;
        assert_ne!(res.status, 200);
        res.assert_cors_headers();
    }
}
