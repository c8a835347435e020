//! Dispatcher - resolves, rewrites and forwards one request

use std::sync::Arc;
use std::time::Duration;

use apigw_core::routing;
use apigw_core::{AuthDecision, GatewayError, GatewayResult, ServiceEntry, ServiceRegistry};
use axum::body::Body;
use axum::http::{Request, Response, Uri};
use reqwest::Client;
use tracing::{debug, instrument, warn};

use crate::headers::{downstream_response_headers, upstream_request_headers};

/// Largest request body buffered for forwarding (10 MiB)
pub const DEFAULT_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// A registry entry resolved from a request path
#[derive(Debug, Clone, Copy)]
pub struct Route<'a> {
    pub name: &'a str,
    pub entry: &'a ServiceEntry,
}

impl Route<'_> {
    /// Upstream URL for `uri`: rewritten path plus the original query
    pub fn target_url(&self, uri: &Uri) -> GatewayResult<String> {
        let path = routing::rewrite_path(uri.path(), self.name, self.entry.base_path())
            .ok_or_else(|| GatewayError::service_not_found(self.name))?;
        let path_and_query = match uri.query() {
            Some(query) => format!("{}?{}", path, query),
            None => path,
        };
        Ok(self.entry.upstream_url(&path_and_query))
    }
}

/// Map a `reqwest` transport failure to the gateway taxonomy.
///
/// Timeouts are checked first: a connect timeout is still a timeout.
pub fn classify_transport_error(service: &str, err: &reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::UpstreamTimeout {
            service: service.to_string(),
        }
    } else if err.is_connect() {
        GatewayError::UpstreamUnavailable {
            service: service.to_string(),
        }
    } else {
        GatewayError::UpstreamProtocol {
            service: service.to_string(),
            message: "Proxy request failed".to_string(),
        }
    }
}

/// Forwards authorized requests to registered backends
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ServiceRegistry>,
    client: Client,
    body_limit: usize,
}

impl Dispatcher {
    pub fn new(registry: Arc<ServiceRegistry>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .tcp_keepalive(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            registry,
            client,
            body_limit: DEFAULT_BODY_LIMIT,
        })
    }

    /// Set the request body limit
    pub fn with_body_limit(mut self, body_limit: usize) -> Self {
        self.body_limit = body_limit;
        self
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Resolve the service named by the first segment after `/api`
    pub fn resolve(&self, path: &str) -> GatewayResult<Route<'_>> {
        let name = routing::service_name(path).ok_or_else(GatewayError::route_not_found)?;
        let (name, entry) = self.registry.get_key_value(name)?;
        Ok(Route { name, entry })
    }

    /// Check the entry's auth requirement against `decision`.
    ///
    /// A denied decision never passes. An entry requiring auth needs an
    /// identity on the decision itself.
    pub fn authorize(&self, route: &Route<'_>, decision: &AuthDecision) -> GatewayResult<()> {
        match decision {
            AuthDecision::Denied(denial) => Err(denial.clone().into()),
            AuthDecision::Allowed(None) if route.entry.requires_auth => Err(
                GatewayError::Unauthorized("Authentication required.".to_string()),
            ),
            AuthDecision::Allowed(_) => Ok(()),
        }
    }

    /// Resolve, authorize, rewrite and forward `request`.
    #[instrument(skip_all, fields(method = %request.method(), path = %request.uri().path()))]
    pub async fn dispatch(
        &self,
        request: Request<Body>,
        decision: &AuthDecision,
    ) -> GatewayResult<Response<Body>> {
        let route = self.resolve(request.uri().path())?;
        self.authorize(&route, decision)?;
        self.forward(route, request, decision.subject_or_anonymous()).await
    }

    async fn forward(
        &self,
        route: Route<'_>,
        request: Request<Body>,
        subject: &str,
    ) -> GatewayResult<Response<Body>> {
        let target = route.target_url(request.uri())?;
        let timeout = route.entry.effective_timeout();

        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, self.body_limit).await.map_err(|e| {
            debug!(error = %e, "Failed to read request body");
            GatewayError::Validation("Invalid request data".to_string())
        })?;

        let headers = upstream_request_headers(&parts.headers, route.name, subject);

        debug!(service = %route.name, target = %target, timeout_ms = timeout.as_millis() as u64, "Forwarding request");

        let upstream = self
            .client
            .request(parts.method, &target)
            .headers(headers)
            .body(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                warn!(service = %route.name, target = %target, error = %e, "Proxy error");
                classify_transport_error(route.name, &e)
            })?;

        let status = upstream.status();
        let headers = downstream_response_headers(upstream.headers());
        debug!(service = %route.name, status = status.as_u16(), "Upstream responded");

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}
