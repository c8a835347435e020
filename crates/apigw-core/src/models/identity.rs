//! Caller identity and authentication decisions

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Subject id forwarded upstream when a request carries no identity
pub const ANONYMOUS_SUBJECT: &str = "anonymous";

/// Resolved caller attributes for one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Subject id
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Role (single-valued)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
}

impl Identity {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            email: None,
            role: None,
            permissions: BTreeSet::new(),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.role.as_deref() == Some(role)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

/// Why a request was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialKind {
    /// No bearer credential on the request
    MissingCredential,
    /// Credential failed verification (signature, expiry, claims, remote rejection)
    InvalidCredential,
    /// The remote identity-validation endpoint could not be reached
    ValidatorUnavailable,
    /// The remote identity-validation endpoint answered with something unusable
    ValidatorFault,
}

impl DenialKind {
    /// HTTP status code for this kind of denial
    pub fn status_code(&self) -> u16 {
        match self {
            DenialKind::MissingCredential => 401,
            DenialKind::InvalidCredential => 401,
            DenialKind::ValidatorUnavailable => 503,
            DenialKind::ValidatorFault => 500,
        }
    }
}

/// A denied authentication attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthDenial {
    pub kind: DenialKind,
    pub reason: String,
}

impl AuthDenial {
    pub fn new(kind: DenialKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }

    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }
}

/// Outcome of the identity resolver for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    /// Request may proceed. `None` when it was let through without
    /// verification (public route or open service).
    Allowed(Option<Identity>),
    /// Request is rejected
    Denied(AuthDenial),
}

impl AuthDecision {
    pub fn denied(kind: DenialKind, reason: impl Into<String>) -> Self {
        AuthDecision::Denied(AuthDenial::new(kind, reason))
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, AuthDecision::Allowed(_))
    }

    /// Verified identity, if the decision carries one
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            AuthDecision::Allowed(identity) => identity.as_ref(),
            AuthDecision::Denied(_) => None,
        }
    }

    /// Subject id to forward upstream
    pub fn subject_or_anonymous(&self) -> &str {
        self.identity()
            .map(|i| i.subject.as_str())
            .unwrap_or(ANONYMOUS_SUBJECT)
    }
}
