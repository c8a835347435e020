//! Observability records and the sink they are written to
//!
//! The gateway emits one [`LogRecord`] per request and, for failed
//! requests, one additional [`ErrorRecord`]. Where the records end up is
//! up to the [`ObservabilitySink`]; [`TracingSink`] forwards them as
//! structured `tracing` events.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Access record, one per request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub method: String,
    /// Original request path and query
    pub path: String,
    pub user_agent: String,
    /// Caller IP, empty when unknown
    pub ip: String,
    /// Subject id of the verified identity
    #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub status_code: u16,
    #[serde(rename = "responseTime")]
    pub response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Detailed record for a failed request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub path: String,
    #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub status_code: u16,
    /// Error kind, e.g. `upstream_timeout`
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Write-only consumer of observability records
pub trait ObservabilitySink: Send + Sync {
    fn record_request(&self, record: &LogRecord);

    fn record_error(&self, record: &ErrorRecord);
}

/// Sink that emits records as `tracing` events on the
/// `apigw::access` and `apigw::error` targets
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ObservabilitySink for TracingSink {
    fn record_request(&self, r: &LogRecord) {
        tracing::info!(
            target: "apigw::access",
            timestamp = %r.timestamp.to_rfc3339(),
            method = %r.method,
            path = %r.path,
            user_agent = %r.user_agent,
            ip = %r.ip,
            user_id = r.subject.as_deref(),
            status = r.status_code,
            response_time_ms = r.response_time_ms,
            service = r.service.as_deref(),
            request_id = r.request_id.as_deref(),
            "request completed"
        );
    }

    fn record_error(&self, r: &ErrorRecord) {
        if r.status_code >= 500 {
            tracing::error!(
                target: "apigw::error",
                timestamp = %r.timestamp.to_rfc3339(),
                method = %r.method,
                path = %r.path,
                user_id = r.subject.as_deref(),
                status = r.status_code,
                kind = %r.kind,
                message = %r.message,
                service = r.service.as_deref(),
                request_id = r.request_id.as_deref(),
                "request failed"
            );
        } else {
            tracing::warn!(
                target: "apigw::error",
                timestamp = %r.timestamp.to_rfc3339(),
                method = %r.method,
                path = %r.path,
                user_id = r.subject.as_deref(),
                status = r.status_code,
                kind = %r.kind,
                message = %r.message,
                service = r.service.as_deref(),
                request_id = r.request_id.as_deref(),
                "request rejected"
            );
        }
    }
}
