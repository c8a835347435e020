//! Single-backend health probe

use std::time::Instant;

use apigw_core::{HealthProbeResult, ServiceEntry};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument, warn};

/// A liveness check against one backend.
///
/// Implementations never fail: every outcome is a [`HealthProbeResult`].
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, name: &str, entry: &ServiceEntry) -> HealthProbeResult;
}

/// Probes `entry.url + entry.health_path` over HTTP
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    pub fn new() -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().build()?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Probe for HttpProber {
    /// Healthy only on a 200 response within the entry's timeout
    #[instrument(skip(self, entry), fields(url = %entry.health_url()))]
    async fn probe(&self, name: &str, entry: &ServiceEntry) -> HealthProbeResult {
        let timeout = entry.effective_timeout();
        let started = Instant::now();

        let result = self
            .client
            .get(entry.health_url())
            .timeout(timeout)
            .send()
            .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(response) if response.status() == StatusCode::OK => {
                debug!(response_time_ms = elapsed_ms, "Service healthy");
                HealthProbeResult::healthy(name, elapsed_ms)
            }
            Ok(response) => {
                let status = response.status().as_u16();
                warn!(status, response_time_ms = elapsed_ms, "Service returned non-200 health status");
                HealthProbeResult::unhealthy(name, elapsed_ms, format!("Unexpected status: {}", status))
            }
            Err(e) => {
                let error = if e.is_timeout() {
                    format!("timeout of {}ms exceeded", timeout.as_millis())
                } else {
                    e.to_string()
                };
                warn!(error = %error, response_time_ms = elapsed_ms, "Service health check failed");
                HealthProbeResult::unhealthy(name, elapsed_ms, error)
            }
        }
    }
}
