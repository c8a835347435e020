//! Gateway error taxonomy

use thiserror::Error;

use crate::models::{AuthDenial, DenialKind};

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Coarse classification of a [`GatewayError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 401/403 - bad, missing or insufficient credential
    AuthRejected,
    /// 503 - upstream refused the connection, or the identity service is down
    UpstreamUnavailable,
    /// 504 - upstream exceeded its deadline
    UpstreamTimeout,
    /// 502 - any other upstream transport failure
    UpstreamProtocolError,
    /// 404 - unknown service name or path
    RouteNotFound,
    /// 400 - malformed request
    ValidationError,
    /// 500 - fault inside the gateway
    InternalFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::AuthRejected => "auth_rejected",
            ErrorKind::UpstreamUnavailable => "upstream_unavailable",
            ErrorKind::UpstreamTimeout => "upstream_timeout",
            ErrorKind::UpstreamProtocolError => "upstream_protocol_error",
            ErrorKind::RouteNotFound => "route_not_found",
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::InternalFailure => "internal_failure",
        }
    }
}

/// Errors raised anywhere in the gateway.
///
/// Every variant is terminal: the outermost layer turns it into an error
/// envelope and an error log record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Missing or invalid credential
    #[error("{0}")]
    Unauthorized(String),

    /// Valid credential lacking a role or permission
    #[error("{0}")]
    Forbidden(String),

    /// Unknown service or path
    #[error("{message}")]
    RouteNotFound {
        message: String,
        service: Option<String>,
    },

    /// Malformed request
    #[error("{0}")]
    Validation(String),

    /// Upstream refused the connection
    #[error("Service temporarily unavailable")]
    UpstreamUnavailable { service: String },

    /// Upstream did not answer within the configured timeout
    #[error("Service timeout")]
    UpstreamTimeout { service: String },

    /// Any other upstream transport failure
    #[error("{message}")]
    UpstreamProtocol { service: String, message: String },

    /// The identity-validation endpoint could not be reached
    #[error("{0}")]
    IdentityUnavailable(String),

    /// Internal error
    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    /// 404 for a service name missing from the registry
    pub fn service_not_found(service: impl Into<String>) -> Self {
        let service = service.into();
        GatewayError::RouteNotFound {
            message: format!("Service not found: {}", service),
            service: Some(service),
        }
    }

    /// 404 for a path no route matches
    pub fn route_not_found() -> Self {
        GatewayError::RouteNotFound {
            message: "Route not found".to_string(),
            service: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Unauthorized(_) | GatewayError::Forbidden(_) => ErrorKind::AuthRejected,
            GatewayError::RouteNotFound { .. } => ErrorKind::RouteNotFound,
            GatewayError::Validation(_) => ErrorKind::ValidationError,
            GatewayError::UpstreamUnavailable { .. } | GatewayError::IdentityUnavailable(_) => {
                ErrorKind::UpstreamUnavailable
            }
            GatewayError::UpstreamTimeout { .. } => ErrorKind::UpstreamTimeout,
            GatewayError::UpstreamProtocol { .. } => ErrorKind::UpstreamProtocolError,
            GatewayError::Internal(_) => ErrorKind::InternalFailure,
        }
    }

    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::Unauthorized(_) => 401,
            GatewayError::Forbidden(_) => 403,
            GatewayError::RouteNotFound { .. } => 404,
            GatewayError::Validation(_) => 400,
            GatewayError::UpstreamUnavailable { .. } => 503,
            GatewayError::UpstreamTimeout { .. } => 504,
            GatewayError::UpstreamProtocol { .. } => 502,
            GatewayError::IdentityUnavailable(_) => 503,
            GatewayError::Internal(_) => 500,
        }
    }

    /// Name of the backend the error originated from, if any
    pub fn service(&self) -> Option<&str> {
        match self {
            GatewayError::RouteNotFound { service, .. } => service.as_deref(),
            GatewayError::UpstreamUnavailable { service }
            | GatewayError::UpstreamTimeout { service }
            | GatewayError::UpstreamProtocol { service, .. } => Some(service),
            _ => None,
        }
    }
}

impl From<AuthDenial> for GatewayError {
    fn from(denial: AuthDenial) -> Self {
        match denial.kind {
            DenialKind::MissingCredential | DenialKind::InvalidCredential => {
                GatewayError::Unauthorized(denial.reason)
            }
            DenialKind::ValidatorUnavailable => GatewayError::IdentityUnavailable(denial.reason),
            DenialKind::ValidatorFault => GatewayError::Internal(denial.reason),
        }
    }
}
