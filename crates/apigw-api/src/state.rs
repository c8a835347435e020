//! Application state for the gateway API

use std::sync::Arc;
use std::time::Instant;

use apigw_auth::{AuthConfig, IdentityResolver};
use apigw_core::{ObservabilitySink, ServiceRegistry, TracingSink};
use apigw_health::HealthAggregator;
use apigw_proxy::Dispatcher;

/// Application state shared across all handlers.
///
/// Everything here is immutable after startup; cloning is a handful of
/// reference-count bumps.
#[derive(Clone)]
pub struct AppState {
    resolver: Arc<IdentityResolver>,
    dispatcher: Arc<Dispatcher>,
    aggregator: Arc<HealthAggregator>,
    sink: Arc<dyn ObservabilitySink>,
    allowed_origins: Arc<Vec<String>>,
    trust_forwarded_for: bool,
    started_at: Instant,
}

impl AppState {
    /// Build the gateway components over `registry`, logging through [`TracingSink`]
    pub fn new(registry: Arc<ServiceRegistry>, auth: AuthConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            resolver: Arc::new(IdentityResolver::new(auth)?),
            dispatcher: Arc::new(Dispatcher::new(registry.clone())?),
            aggregator: Arc::new(HealthAggregator::new(registry)?),
            sink: Arc::new(TracingSink),
            allowed_origins: Arc::new(Vec::new()),
            trust_forwarded_for: false,
            started_at: Instant::now(),
        })
    }

    pub fn with_sink(mut self, sink: Arc<dyn ObservabilitySink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_aggregator(mut self, aggregator: HealthAggregator) -> Self {
        self.aggregator = Arc::new(aggregator);
        self
    }

    /// Origins allowed by CORS
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = Arc::new(origins);
        self
    }

    /// Take the caller IP from `x-forwarded-for` instead of the peer
    /// address. Only for deployments behind a proxy that sets it.
    pub fn with_trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    /// Largest request body forwarded upstream
    pub fn with_body_limit(mut self, body_limit: usize) -> Self {
        let dispatcher = (*self.dispatcher).clone().with_body_limit(body_limit);
        self.dispatcher = Arc::new(dispatcher);
        self
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn aggregator(&self) -> &HealthAggregator {
        &self.aggregator
    }

    pub fn sink(&self) -> &dyn ObservabilitySink {
        self.sink.as_ref()
    }

    pub fn allowed_origins(&self) -> &[String] {
        &self.allowed_origins
    }

    pub fn trust_forwarded_for(&self) -> bool {
        self.trust_forwarded_for
    }

    /// Seconds since the state was built
    pub fn uptime_secs(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }
}
