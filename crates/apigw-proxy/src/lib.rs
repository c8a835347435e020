//! apigw-proxy - Request dispatcher
//!
//! For an authorized request the [`Dispatcher`] resolves the target
//! service from the registry, enforces the entry's auth requirement,
//! rewrites the path and forwards the request over HTTP. Transport
//! failures come back as typed [`GatewayError`](apigw_core::GatewayError)s;
//! upstream responses of any status are passed through untouched.

mod dispatcher;
mod headers;

pub use dispatcher::{classify_transport_error, Dispatcher, Route, DEFAULT_BODY_LIMIT};
pub use headers::{GATEWAY_SERVICE_HEADER, GATEWAY_USER_HEADER};
