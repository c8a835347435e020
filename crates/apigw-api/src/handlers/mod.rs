//! HTTP request handlers

pub mod health;
pub mod proxy;

use axum::response::{IntoResponse, Response};

use apigw_core::GatewayError;

use crate::error::{ApiError, RequestMeta};

/// Fallback for unmatched routes
pub async fn not_found(meta: RequestMeta) -> Response {
    ApiError::new(GatewayError::route_not_found(), meta).into_response()
}
