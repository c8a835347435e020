//! Request logging middleware

use std::net::SocketAddr;
use std::time::Instant;

use apigw_core::{ErrorRecord, GatewayError, LogRecord};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::USER_AGENT;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use tracing::debug;

use crate::error::{original_url, service_in_url, REQUEST_ID_HEADER};
use crate::state::AppState;

/// What the pipeline resolved about a request, attached to its response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestAttribution {
    pub service: Option<String>,
    pub subject: Option<String>,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Peer address, or the first `x-forwarded-for` hop when the gateway
/// trusts the proxy in front of it
fn client_ip(request: &Request, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let first = header_str(request.headers(), "x-forwarded-for")
            .and_then(|forwarded| forwarded.split(',').next())
            .map(str::trim)
            .filter(|first| !first.is_empty());
        if let Some(first) = first {
            return first.to_string();
        }
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default()
}

/// Emit one access record per request and an error record for failures
pub async fn request_logging(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().to_string();
    let path = original_url(request.uri());
    let user_agent = header_str(request.headers(), USER_AGENT.as_str())
        .unwrap_or_default()
        .to_string();
    let request_id = header_str(request.headers(), REQUEST_ID_HEADER).map(str::to_string);
    let ip = client_ip(&request, state.trust_forwarded_for());

    debug!(method = %method, path = %path, "Incoming request");

    let response = next.run(request).await;

    let response_time_ms = started.elapsed().as_millis() as u64;
    let status_code = response.status().as_u16();
    let attribution = response
        .extensions()
        .get::<RequestAttribution>()
        .cloned()
        .unwrap_or_default();
    let error = response.extensions().get::<GatewayError>();

    let service = attribution
        .service
        .or_else(|| error.and_then(|e| e.service()).map(str::to_string))
        .or_else(|| service_in_url(&path).map(str::to_string));

    let timestamp = Utc::now();
    state.sink().record_request(&LogRecord {
        timestamp,
        method: method.clone(),
        path: path.clone(),
        user_agent,
        ip,
        subject: attribution.subject.clone(),
        status_code,
        response_time_ms,
        service: service.clone(),
        request_id: request_id.clone(),
    });

    if let Some(error) = error {
        state.sink().record_error(&ErrorRecord {
            timestamp,
            method,
            path,
            subject: attribution.subject,
            status_code,
            kind: error.kind().as_str().to_string(),
            message: error.to_string(),
            service,
            request_id,
        });
    }

    response
}
