//! Data model shared across the gateway

mod health;
mod identity;
mod service;

pub use health::{HealthProbeResult, HealthSummary, HealthVerdict, OverallStatus, ProbeStatus};
pub use identity::{AuthDecision, AuthDenial, DenialKind, Identity, ANONYMOUS_SUBJECT};
pub use service::{ServiceEntry, DEFAULT_HEALTH_PATH, DEFAULT_TIMEOUT};
