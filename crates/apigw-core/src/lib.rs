//! apigw-core - Core types for the API gateway
//!
//! This crate holds the pieces every other gateway crate shares:
//! the immutable [`ServiceRegistry`], the per-request [`Identity`] and
//! [`AuthDecision`], health probe results and verdicts, the
//! [`GatewayError`] taxonomy and the observability record contracts.
//!
//! Nothing in here performs I/O.

pub mod error;
pub mod models;
pub mod observability;
pub mod registry;
pub mod routing;

pub use error::{ErrorKind, GatewayError, GatewayResult};
pub use models::*;
pub use observability::{ErrorRecord, LogRecord, ObservabilitySink, TracingSink};
pub use registry::{RegistryBuilder, RegistryError, ServiceNotFound, ServiceRegistry};
