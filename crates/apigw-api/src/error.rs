//! Error envelope rendering
//!
//! This is the only place a [`GatewayError`] becomes an HTTP response.
//! The rendered response carries the error in its extensions so the
//! request logger can emit the matching error record.

use std::convert::Infallible;

use apigw_core::routing;
use apigw_core::GatewayError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Request id header set by the request-id layer
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request attributes echoed in the error envelope
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    pub method: String,
    /// Original path and query
    pub path: String,
    pub request_id: Option<String>,
}

impl RequestMeta {
    pub fn new(method: &Method, uri: &Uri, headers: &HeaderMap) -> Self {
        Self {
            method: method.to_string(),
            path: original_url(uri),
            request_id: headers
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestMeta {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::new(&parts.method, &parts.uri, &parts.headers))
    }
}

/// Path plus query, as the caller sent it
pub(crate) fn original_url(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string())
}

/// Service segment of an `/api/{service}` URL, ignoring the query
pub(crate) fn service_in_url(url: &str) -> Option<&str> {
    let path = url.split('?').next().unwrap_or(url);
    routing::service_name(path)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    message: String,
    status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    service: Option<String>,
    timestamp: DateTime<Utc>,
    path: String,
    method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

/// A gateway error bound to the request it terminated
#[derive(Debug)]
pub struct ApiError {
    error: GatewayError,
    meta: RequestMeta,
}

impl ApiError {
    pub fn new(error: GatewayError, meta: RequestMeta) -> Self {
        Self { error, meta }
    }

    pub fn error(&self) -> &GatewayError {
        &self.error
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let service = self
            .error
            .service()
            .or_else(|| service_in_url(&self.meta.path))
            .map(str::to_string);

        let body = ErrorEnvelope {
            error: ErrorBody {
                message: self.error.to_string(),
                status_code: status.as_u16(),
                service,
                timestamp: Utc::now(),
                path: self.meta.path,
                method: self.meta.method,
                request_id: self.meta.request_id,
            },
        };

        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(self.error);
        response
    }
}
