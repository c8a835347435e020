//! Integration test support for the API gateway
//!
//! Everything runs on loopback: mock upstreams and the gateway itself are
//! real axum servers bound to `127.0.0.1:0`, exercised with `reqwest`.
//!
//! # Test Structure
//!
//! - `gateway_e2e_test.rs` - auth gate, dispatch, transport failure mapping
//! - `health_e2e_test.rs` - probes and aggregation against live upstreams

pub mod upstream;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use apigw_api::{create_router, AppState};
use apigw_auth::AuthConfig;
use apigw_core::{ErrorRecord, LogRecord, ObservabilitySink, ServiceRegistry};
use jsonwebtoken::{encode, EncodingKey, Header};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// Secret shared by test gateways and minted tokens
pub const TEST_SECRET: &str = "integration-test-secret";

/// A server that shuts down when dropped
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    /// Serve `router` on an ephemeral loopback port
    pub async fn start(router: axum::Router) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let handle = tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .ok();
        });

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(std::io::Error::other)?;

        Ok(Self {
            addr,
            client,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Shutdown the server gracefully
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Sink that keeps every record for later assertions
#[derive(Default)]
pub struct RecordingSink {
    requests: Mutex<Vec<LogRecord>>,
    errors: Mutex<Vec<ErrorRecord>>,
}

impl RecordingSink {
    pub fn requests(&self) -> Vec<LogRecord> {
        self.requests.lock().clone()
    }

    pub fn errors(&self) -> Vec<ErrorRecord> {
        self.errors.lock().clone()
    }
}

impl ObservabilitySink for RecordingSink {
    fn record_request(&self, record: &LogRecord) {
        self.requests.lock().push(record.clone());
    }

    fn record_error(&self, record: &ErrorRecord) {
        self.errors.lock().push(record.clone());
    }
}

/// A running gateway plus the records it emitted
pub struct Gateway {
    pub server: TestServer,
    pub sink: Arc<RecordingSink>,
}

impl Gateway {
    pub async fn start(registry: ServiceRegistry, auth: AuthConfig) -> Self {
        let sink = Arc::new(RecordingSink::default());
        let state = AppState::new(Arc::new(registry), auth)
            .expect("gateway state")
            .with_sink(sink.clone());
        let server = TestServer::start(create_router(state))
            .await
            .expect("gateway server");
        Self { server, sink }
    }

    /// Gateway with the default auth settings and [`TEST_SECRET`]
    pub async fn with_registry(registry: ServiceRegistry) -> Self {
        Self::start(registry, AuthConfig::new(TEST_SECRET)).await
    }

    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.server.client.get(self.server.url(path))
    }

    pub fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.server.client.request(method, self.server.url(path))
    }
}

/// Sign `claims` with [`TEST_SECRET`]
pub fn mint_token(claims: Value) -> String {
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .expect("token encoding")
}

/// Valid for an hour, subject `subject`
pub fn token_for(subject: &str) -> String {
    let exp = chrono::Utc::now().timestamp() + 3600;
    mint_token(json!({ "id": subject, "exp": exp }))
}

/// Signed correctly but expired a minute ago
pub fn expired_token(subject: &str) -> String {
    let exp = chrono::Utc::now().timestamp() - 60;
    mint_token(json!({ "id": subject, "exp": exp }))
}

/// Parse `url` as a registry upstream URL
pub fn upstream_url(server: &TestServer) -> url::Url {
    url::Url::parse(&server.base_url()).expect("loopback url")
}

/// URL of a loopback port with no listener
pub fn closed_port_url() -> url::Url {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .map(|addr| addr.port())
        .expect("ephemeral port");
    url::Url::parse(&format!("http://127.0.0.1:{}", port)).expect("loopback url")
}
