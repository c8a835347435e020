//! apigw-health - Backend liveness checks
//!
//! [`HttpProber`] issues one bounded GET against a backend's health
//! path and always resolves to a [`HealthProbeResult`](apigw_core::HealthProbeResult).
//! [`HealthAggregator`] fans probes out across the whole registry
//! concurrently and reduces them into a [`HealthVerdict`](apigw_core::HealthVerdict).
//!
//! ```text
//!             HealthAggregator::aggregate_all()
//!                          │
//!        ┌─────────────────┼─────────────────┐
//!        ▼                 ▼                 ▼
//!   probe(auth)      probe(orders)     probe(payments)     (concurrent)
//!        │                 │                 │
//!        └─────────────────┼─────────────────┘
//!                          ▼
//!                 HealthVerdict::reduce
//! ```

mod aggregator;
mod prober;

pub use aggregator::HealthAggregator;
pub use prober::{HttpProber, Probe};
