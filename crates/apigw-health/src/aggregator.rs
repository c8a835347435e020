//! Registry-wide health aggregation

use std::sync::Arc;

use apigw_core::{HealthProbeResult, HealthVerdict, ServiceNotFound, ServiceRegistry};
use futures::future::join_all;
use tracing::{info, instrument};

use crate::prober::{HttpProber, Probe};

/// Fans probes out across the registry and reduces the results
#[derive(Clone)]
pub struct HealthAggregator {
    registry: Arc<ServiceRegistry>,
    prober: Arc<dyn Probe>,
}

impl HealthAggregator {
    /// Aggregator probing over HTTP
    pub fn new(registry: Arc<ServiceRegistry>) -> Result<Self, reqwest::Error> {
        Ok(Self::with_prober(registry, Arc::new(HttpProber::new()?)))
    }

    pub fn with_prober(registry: Arc<ServiceRegistry>, prober: Arc<dyn Probe>) -> Self {
        Self { registry, prober }
    }

    /// Probe every registered service concurrently and reduce.
    ///
    /// All probes are started before any is awaited, so the total time is
    /// bounded by the slowest probe's own timeout. Results keep registry
    /// order.
    #[instrument(skip(self), fields(services = self.registry.len()))]
    pub async fn aggregate_all(&self) -> HealthVerdict {
        let probes = self
            .registry
            .iter()
            .map(|(name, entry)| self.prober.probe(name, entry));
        let results = join_all(probes).await;

        let verdict = HealthVerdict::reduce(results);
        info!(
            status = ?verdict.status,
            total = verdict.summary.total,
            healthy = verdict.summary.healthy,
            unhealthy = verdict.summary.unhealthy,
            "Health aggregation complete"
        );
        verdict
    }

    /// Probe a single registered service.
    ///
    /// Unregistered names return `ServiceNotFound` without probing anything.
    pub async fn probe_one(&self, name: &str) -> Result<HealthProbeResult, ServiceNotFound> {
        let (name, entry) = self.registry.get_key_value(name)?;
        Ok(self.prober.probe(name, entry).await)
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    use super::*;
    use apigw_core::{OverallStatus, ServiceEntry};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use url::Url;

    /// Probe that sleeps, then reports the configured outcome
    struct FakeProbe {
        down: HashSet<&'static str>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl FakeProbe {
        fn new(down: &[&'static str], delay: Duration) -> Self {
            Self {
                down: down.iter().copied().collect(),
                delay,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Probe for FakeProbe {
        async fn probe(&self, name: &str, _entry: &ServiceEntry) -> HealthProbeResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            let ms = self.delay.as_millis() as u64;
            if self.down.contains(name) {
                HealthProbeResult::unhealthy(name, ms, "timeout")
            } else {
                HealthProbeResult::healthy(name, ms)
            }
        }
    }

    fn registry(names: &[&str]) -> Arc<ServiceRegistry> {
        let mut builder = ServiceRegistry::builder();
        for (i, name) in names.iter().enumerate() {
            let url = Url::parse(&format!("http://127.0.0.1:{}", 3001 + i)).unwrap();
            builder = builder.register(*name, ServiceEntry::new(url)).unwrap();
        }
        Arc::new(builder.build())
    }

    const FIVE: [&str; 5] = ["auth", "users", "orders", "products", "payments"];

    #[tokio::test]
    async fn test_two_of_five_down_is_degraded() {
        let probe = Arc::new(FakeProbe::new(&["orders", "payments"], Duration::from_millis(5)));
        let aggregator = HealthAggregator::with_prober(registry(&FIVE), probe);

        let verdict = aggregator.aggregate_all().await;
        assert_eq!(verdict.status, OverallStatus::Degraded);
        assert_eq!(verdict.summary.total, 5);
        assert_eq!(verdict.summary.healthy, 3);
        assert_eq!(verdict.summary.unhealthy, 2);
        assert_eq!(verdict.http_status_code(), 207);

        let names: Vec<&str> = verdict.services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, FIVE.to_vec());
    }

    #[tokio::test]
    async fn test_all_down_is_unhealthy() {
        let probe = Arc::new(FakeProbe::new(&FIVE, Duration::from_millis(1)));
        let verdict = HealthAggregator::with_prober(registry(&FIVE), probe)
            .aggregate_all()
            .await;
        assert_eq!(verdict.status, OverallStatus::Unhealthy);
        assert_eq!(verdict.summary.unhealthy, 5);
    }

    #[tokio::test]
    async fn test_probes_run_concurrently() {
        let delay = Duration::from_millis(300);
        let probe = Arc::new(FakeProbe::new(&[], delay));
        let aggregator = HealthAggregator::with_prober(registry(&FIVE), probe.clone());

        let started = Instant::now();
        let verdict = aggregator.aggregate_all().await;
        let elapsed = started.elapsed();

        assert_eq!(verdict.status, OverallStatus::Healthy);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 5);
        // Sequential probing would take at least 1.5s
        assert!(elapsed < delay * 3, "aggregation took {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_probe_one_unknown_has_no_side_effects() {
        let probe = Arc::new(FakeProbe::new(&[], Duration::from_millis(1)));
        let aggregator = HealthAggregator::with_prober(registry(&FIVE), probe.clone());

        let err = aggregator.probe_one("ghost").await.unwrap_err();
        assert_eq!(err, ServiceNotFound("ghost".to_string()));
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);

        let result = aggregator.probe_one("orders").await.unwrap();
        assert_eq!(result.name, "orders");
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }
}
