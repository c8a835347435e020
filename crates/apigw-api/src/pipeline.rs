//! Request pipeline for proxied routes
//!
//! A proxied request passes a fixed sequence of stages:
//!
//! ```text
//! resolve_route ─▶ authenticate ─▶ enforce ─▶ Dispatcher::dispatch
//!      │                │              │
//!      └── 404          └── 401/503    └── 401/403
//! ```
//!
//! Each stage either continues with what it resolved or short-circuits
//! with the error that ends the request. [`run`] is the only driver.

use apigw_auth::{enforce_policy, IdentityResolver};
use apigw_core::{AuthDecision, DenialKind, GatewayError, GatewayResult, ServiceEntry};
use apigw_proxy::{Dispatcher, Route};
use axum::body::Body;
use axum::http::header::AUTHORIZATION;
use axum::http::{Request, Response};
use tracing::debug;

use crate::middleware::RequestAttribution;
use crate::state::AppState;

/// Result of one pipeline stage
#[derive(Debug)]
pub enum Flow<T> {
    Continue(T),
    ShortCircuit(GatewayError),
}

impl<T> Flow<T> {
    pub fn into_result(self) -> GatewayResult<T> {
        match self {
            Flow::Continue(value) => Ok(value),
            Flow::ShortCircuit(error) => Err(error),
        }
    }
}

impl<T> From<GatewayResult<T>> for Flow<T> {
    fn from(result: GatewayResult<T>) -> Self {
        match result {
            Ok(value) => Flow::Continue(value),
            Err(error) => Flow::ShortCircuit(error),
        }
    }
}

/// Find the registry entry named by the path
pub fn resolve_route<'a>(dispatcher: &'a Dispatcher, path: &str) -> Flow<Route<'a>> {
    dispatcher.resolve(path).into()
}

/// Run the identity resolver.
///
/// A missing credential is not an error for a service that does not
/// require auth; the request continues anonymously. A presented but
/// invalid credential is rejected regardless.
pub async fn authenticate(
    resolver: &IdentityResolver,
    path: &str,
    authorization: Option<&str>,
    entry: &ServiceEntry,
) -> Flow<AuthDecision> {
    match resolver.authenticate(path, authorization).await {
        AuthDecision::Denied(denial)
            if denial.kind == DenialKind::MissingCredential && !entry.requires_auth =>
        {
            debug!("No credential for open service, continuing anonymously");
            Flow::Continue(AuthDecision::Allowed(None))
        }
        AuthDecision::Denied(denial) => Flow::ShortCircuit(denial.into()),
        allowed => Flow::Continue(allowed),
    }
}

/// Apply the entry's role and permission guards
pub fn enforce(decision: &AuthDecision, entry: &ServiceEntry) -> Flow<()> {
    enforce_policy(decision, entry).into()
}

/// What driving a request produced
#[derive(Debug)]
pub struct Outcome {
    pub result: GatewayResult<Response<Body>>,
    pub attribution: RequestAttribution,
}

/// Drive `request` through every stage and forward it
pub async fn run(state: &AppState, request: Request<Body>) -> Outcome {
    let mut attribution = RequestAttribution::default();
    let result = drive(state, request, &mut attribution).await;
    Outcome {
        result,
        attribution,
    }
}

async fn drive(
    state: &AppState,
    request: Request<Body>,
    attribution: &mut RequestAttribution,
) -> GatewayResult<Response<Body>> {
    let route = resolve_route(state.dispatcher(), request.uri().path()).into_result()?;
    attribution.service = Some(route.name.to_string());

    let authorization = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let decision = authenticate(
        state.resolver(),
        request.uri().path(),
        authorization,
        route.entry,
    )
    .await
    .into_result()?;
    attribution.subject = decision.identity().map(|i| i.subject.clone());

    enforce(&decision, route.entry).into_result()?;

    state.dispatcher().dispatch(request, &decision).await
}
