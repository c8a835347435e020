//! Proxy handler for `/api/{service}/...`

use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};

use crate::error::{ApiError, RequestMeta};
use crate::pipeline;
use crate::state::AppState;

/// ANY /api/{service}/{*rest}
pub async fn forward(State(state): State<AppState>, meta: RequestMeta, request: Request) -> Response {
    let outcome = pipeline::run(&state, request).await;

    let mut response = match outcome.result {
        Ok(response) => response,
        Err(error) => ApiError::new(error, meta).into_response(),
    };
    response.extensions_mut().insert(outcome.attribution);
    response
}
