//! Mock backends

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::TestServer;

/// Echoes the request it received as JSON.
///
/// `?status=<code>` selects the response status. Every response carries
/// `x-upstream: echo` and a hop-by-hop `keep-alive` header.
async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    let status = uri
        .query()
        .and_then(|q| q.split('&').find_map(|kv| kv.strip_prefix("status=")))
        .and_then(|code| code.parse::<u16>().ok())
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::OK);

    let captured: BTreeMap<String, String> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let body = json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "headers": captured,
        "body": String::from_utf8_lossy(&body),
    });

    (
        status,
        [("x-upstream", "echo"), ("keep-alive", "timeout=5")],
        Json(body),
    )
        .into_response()
}

/// Healthy echo backend
pub fn echo_router() -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .fallback(echo)
}

/// Backend that answers everything after `delay`
pub fn slow_router(delay: Duration) -> Router {
    Router::new().fallback(move |method: Method, uri: Uri, headers: HeaderMap, body: Bytes| async move {
        tokio::time::sleep(delay).await;
        echo(method, uri, headers, body).await
    })
}

/// Backend whose health endpoint reports failure
pub fn failing_health_router() -> Router {
    Router::new()
        .route(
            "/health",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "database down") }),
        )
        .fallback(echo)
}

/// How a mock identity service answers `GET /api/validate`
#[derive(Debug, Clone)]
pub enum Validation {
    /// 200 with `{"user": <value>}`
    Accept(serde_json::Value),
    /// 401
    Reject,
    /// 200 with a body that is not JSON
    Garbage,
}

/// Mock identity service that answers after `delay`
pub fn validator_router(delay: Duration, behavior: Validation) -> Router {
    Router::new().route(
        "/api/validate",
        get(move || {
            let behavior = behavior.clone();
            async move {
                tokio::time::sleep(delay).await;
                match behavior {
                    Validation::Accept(user) => {
                        (StatusCode::OK, Json(json!({ "user": user }))).into_response()
                    }
                    Validation::Reject => {
                        (StatusCode::UNAUTHORIZED, Json(json!({ "error": "revoked" }))).into_response()
                    }
                    Validation::Garbage => (StatusCode::OK, "<html>").into_response(),
                }
            }
        }),
    )
}

pub async fn start_echo() -> TestServer {
    TestServer::start(echo_router()).await.expect("echo upstream")
}

pub async fn start_slow(delay: Duration) -> TestServer {
    TestServer::start(slow_router(delay)).await.expect("slow upstream")
}

pub async fn start_failing_health() -> TestServer {
    TestServer::start(failing_health_router())
        .await
        .expect("failing upstream")
}

/// Raw TCP upstream that reads the request head and closes the
/// connection without answering
pub struct DroppingUpstream {
    pub addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl DroppingUpstream {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
            }
        });
        Ok(Self { addr, handle })
    }

    pub fn url(&self) -> url::Url {
        url::Url::parse(&format!("http://{}", self.addr)).expect("loopback url")
    }
}

impl Drop for DroppingUpstream {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
