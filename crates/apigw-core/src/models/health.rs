//! Health probe results and aggregate verdicts

use serde::{Deserialize, Serialize};

/// Liveness of a single backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Healthy,
    Unhealthy,
}

/// Result of one probe against one backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthProbeResult {
    /// Service name
    pub name: String,
    pub status: ProbeStatus,
    /// Time until the probe resolved, in milliseconds
    #[serde(rename = "responseTime")]
    pub response_time_ms: u64,
    /// Failure description for unhealthy results
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthProbeResult {
    pub fn healthy(name: impl Into<String>, response_time_ms: u64) -> Self {
        Self {
            name: name.into(),
            status: ProbeStatus::Healthy,
            response_time_ms,
            error: None,
        }
    }

    pub fn unhealthy(name: impl Into<String>, response_time_ms: u64, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ProbeStatus::Unhealthy,
            response_time_ms,
            error: Some(error.into()),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == ProbeStatus::Healthy
    }

    /// HTTP status code for a single-service health response
    pub fn http_status_code(&self) -> u16 {
        match self.status {
            ProbeStatus::Healthy => 200,
            ProbeStatus::Unhealthy => 503,
        }
    }
}

/// Aggregate health across all backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSummary {
    pub total: usize,
    pub healthy: usize,
    pub unhealthy: usize,
}

/// Aggregated health classification across the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthVerdict {
    pub status: OverallStatus,
    /// Per-service results, in registry order
    pub services: Vec<HealthProbeResult>,
    pub summary: HealthSummary,
}

impl HealthVerdict {
    /// Reduce per-service results into a verdict.
    ///
    /// `unhealthy` when every service is unhealthy (including an empty
    /// registry), `degraded` when some are, `healthy` otherwise.
    pub fn reduce(services: Vec<HealthProbeResult>) -> Self {
        let total = services.len();
        let healthy = services.iter().filter(|s| s.is_healthy()).count();
        let unhealthy = total - healthy;

        let status = if unhealthy == total {
            OverallStatus::Unhealthy
        } else if unhealthy > 0 {
            OverallStatus::Degraded
        } else {
            OverallStatus::Healthy
        };

        Self {
            status,
            services,
            summary: HealthSummary {
                total,
                healthy,
                unhealthy,
            },
        }
    }

    /// 200 healthy, 207 degraded, 503 unhealthy
    pub fn http_status_code(&self) -> u16 {
        match self.status {
            OverallStatus::Healthy => 200,
            OverallStatus::Degraded => 207,
            OverallStatus::Unhealthy => 503,
        }
    }
}
