//! Identity resolver

use std::collections::BTreeSet;
use std::time::Duration;

use apigw_core::{AuthDecision, DenialKind, Identity};
use reqwest::header::HeaderValue;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use crate::claims::{TokenClaims, TokenVerifier};
use crate::validator::{RemoteUser, RemoteValidator, DEFAULT_VALIDATE_TIMEOUT};

/// Paths that bypass authentication, matched by prefix
pub const DEFAULT_PUBLIC_ROUTES: [&str; 3] = ["/health", "/api/auth/login", "/api/auth/register"];

/// Which claim source wins when the token and the remote validation
/// response both carry a field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimPrecedence {
    /// Token fields win; the remote response fills gaps
    #[default]
    Local,
    /// Remote fields win; the token fills gaps
    Remote,
}

/// Identity resolver settings
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Shared HS256 secret
    pub jwt_secret: String,
    pub public_routes: Vec<String>,
    /// Remote validation endpoint; `None` disables the cross-check
    pub validate_url: Option<Url>,
    pub validate_timeout: Duration,
    pub claim_precedence: ClaimPrecedence,
}

impl AuthConfig {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            public_routes: DEFAULT_PUBLIC_ROUTES.iter().map(|r| r.to_string()).collect(),
            validate_url: None,
            validate_timeout: DEFAULT_VALIDATE_TIMEOUT,
            claim_precedence: ClaimPrecedence::Local,
        }
    }
}

/// Extract the token from a `Bearer <token>` header value.
///
/// The scheme is matched case-insensitively; an empty token counts as
/// absent.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let header = header?.trim();
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Produces an [`AuthDecision`] for each request.
///
/// Holds no per-request state; one instance is shared by all requests.
pub struct IdentityResolver {
    public_routes: Vec<String>,
    verifier: TokenVerifier,
    validator: Option<RemoteValidator>,
    precedence: ClaimPrecedence,
}

impl IdentityResolver {
    pub fn new(config: AuthConfig) -> Result<Self, reqwest::Error> {
        let validator = config
            .validate_url
            .map(|url| RemoteValidator::new(url, config.validate_timeout))
            .transpose()?;

        Ok(Self {
            public_routes: config.public_routes,
            verifier: TokenVerifier::hs256(config.jwt_secret.as_bytes()),
            validator,
            precedence: config.claim_precedence,
        })
    }

    /// Whether `path` falls under one of the public-route prefixes
    pub fn is_public_route(&self, path: &str) -> bool {
        self.public_routes.iter().any(|route| path.starts_with(route.as_str()))
    }

    /// Whether a remote cross-check is configured
    pub fn has_remote_validation(&self) -> bool {
        self.validator.is_some()
    }

    /// Decide whether the request to `path` may proceed.
    ///
    /// `authorization` is the raw `Authorization` header value.
    #[instrument(skip(self, authorization))]
    pub async fn authenticate(&self, path: &str, authorization: Option<&str>) -> AuthDecision {
        if self.is_public_route(path) {
            debug!("Public route, skipping authentication");
            return AuthDecision::Allowed(None);
        }

        let Some(token) = bearer_token(authorization) else {
            return AuthDecision::denied(
                DenialKind::MissingCredential,
                "Access denied. No token provided.",
            );
        };

        let local = match self.verifier.verify(token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(error = %e, "JWT verification failed");
                return AuthDecision::denied(DenialKind::InvalidCredential, "Invalid token.");
            }
        };

        let remote = match &self.validator {
            Some(validator) => match validator.validate(token).await {
                Ok(user) => Some(user),
                Err(denial) => return AuthDecision::Denied(denial),
            },
            None => None,
        };

        match merge_claims(local, remote, self.precedence) {
            Some(identity) if !is_forwardable_subject(&identity.subject) => {
                debug!("Subject cannot be forwarded as a header value");
                AuthDecision::denied(DenialKind::InvalidCredential, "Invalid token.")
            }
            Some(identity) => AuthDecision::Allowed(Some(identity)),
            None => AuthDecision::denied(DenialKind::InvalidCredential, "Token has no subject."),
        }
    }
}

/// Subjects are forwarded upstream in a header, so they must be valid
/// header values
fn is_forwardable_subject(subject: &str) -> bool {
    HeaderValue::from_str(subject).is_ok()
}

/// Normalised view over one claim source
struct ClaimSet {
    subject: Option<String>,
    email: Option<String>,
    role: Option<String>,
    permissions: Option<Vec<String>>,
}

impl From<TokenClaims> for ClaimSet {
    fn from(claims: TokenClaims) -> Self {
        Self {
            subject: claims.subject().map(str::to_string),
            email: claims.email,
            role: claims.role,
            permissions: claims.permissions,
        }
    }
}

impl From<RemoteUser> for ClaimSet {
    fn from(user: RemoteUser) -> Self {
        Self {
            subject: user.id.filter(|id| !id.is_empty()),
            email: user.email,
            role: user.role,
            permissions: user.permissions,
        }
    }
}

impl ClaimSet {
    fn empty() -> Self {
        Self {
            subject: None,
            email: None,
            role: None,
            permissions: None,
        }
    }

    /// Field-wise `self.or(fallback)`
    fn or(self, fallback: ClaimSet) -> ClaimSet {
        ClaimSet {
            subject: self.subject.or(fallback.subject),
            email: self.email.or(fallback.email),
            role: self.role.or(fallback.role),
            permissions: self.permissions.or(fallback.permissions),
        }
    }
}

/// Merge token claims and the remote response into an identity.
///
/// Returns `None` when neither source names a subject.
fn merge_claims(
    local: TokenClaims,
    remote: Option<RemoteUser>,
    precedence: ClaimPrecedence,
) -> Option<Identity> {
    let local = ClaimSet::from(local);
    let remote = remote.map(ClaimSet::from).unwrap_or_else(ClaimSet::empty);

    let merged = match precedence {
        ClaimPrecedence::Local => local.or(remote),
        ClaimPrecedence::Remote => remote.or(local),
    };

    Some(Identity {
        subject: merged.subject?,
        email: merged.email,
        role: merged.role,
        permissions: merged
            .permissions
            .unwrap_or_default()
            .into_iter()
            .collect::<BTreeSet<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use pretty_assertions::assert_eq;

    const SECRET: &str = "test-secret";

    fn token(claims: serde_json::Value) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn valid_token() -> String {
        token(serde_json::json!({
            "id": "u-1",
            "email": "a@example.com",
            "role": "admin",
            "permissions": ["orders:read"],
            "exp": chrono::Utc::now().timestamp() + 3600,
        }))
    }

    fn resolver() -> IdentityResolver {
        IdentityResolver::new(AuthConfig::new(SECRET)).unwrap()
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(Some("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(Some("bearer  abc ")), Some("abc"));
        assert_eq!(bearer_token(Some("Basic abc")), None);
        assert_eq!(bearer_token(Some("Bearer ")), None);
        assert_eq!(bearer_token(Some("Bearer")), None);
        assert_eq!(bearer_token(None), None);
    }

    #[tokio::test]
    async fn test_public_routes_bypass_regardless_of_header() {
        let resolver = resolver();
        for header in [None, Some("Bearer garbage"), Some("%%%"), Some("Bearer ")] {
            assert_eq!(
                resolver.authenticate("/health", header).await,
                AuthDecision::Allowed(None)
            );
            assert_eq!(
                resolver.authenticate("/api/auth/login", header).await,
                AuthDecision::Allowed(None)
            );
        }
        assert_eq!(
            resolver.authenticate("/health/detailed", None).await,
            AuthDecision::Allowed(None)
        );
    }

    #[tokio::test]
    async fn test_public_route_never_contacts_validator() {
        let mut config = AuthConfig::new(SECRET);
        config.validate_url = Some(Url::parse("http://127.0.0.1:1/api/validate").unwrap());
        let resolver = IdentityResolver::new(config).unwrap();
        assert!(resolver
            .authenticate("/api/auth/register", Some("Bearer x"))
            .await
            .is_allowed());
    }

    #[tokio::test]
    async fn test_missing_token_is_401() {
        let decision = resolver().authenticate("/api/orders/1", None).await;
        match decision {
            AuthDecision::Denied(denial) => {
                assert_eq!(denial.kind, DenialKind::MissingCredential);
                assert_eq!(denial.status_code(), 401);
            }
            other => panic!("expected denial, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_subject_that_cannot_be_forwarded_is_401() {
        let control = token(serde_json::json!({
            "id": "u-\u{7f}1",
            "exp": chrono::Utc::now().timestamp() + 3600,
        }));
        let header = format!("Bearer {}", control);
        match resolver().authenticate("/api/orders/1", Some(&header)).await {
            AuthDecision::Denied(denial) => {
                assert_eq!(denial.kind, DenialKind::InvalidCredential);
                assert_eq!(denial.reason, "Invalid token.");
            }
            other => panic!("expected denial, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_expired_and_forged_tokens_are_401() {
        let expired = token(serde_json::json!({
            "id": "u-1",
            "exp": chrono::Utc::now().timestamp() - 60,
        }));
        let forged = encode(
            &Header::default(),
            &serde_json::json!({"id": "u-1", "exp": chrono::Utc::now().timestamp() + 3600}),
            &EncodingKey::from_secret(b"not-the-secret"),
        )
        .unwrap();

        for bad in [expired, forged] {
            let header = format!("Bearer {}", bad);
            let decision = resolver().authenticate("/api/orders/1", Some(&header)).await;
            assert_eq!(
                decision,
                AuthDecision::denied(DenialKind::InvalidCredential, "Invalid token.")
            );
        }
    }

    #[tokio::test]
    async fn test_invalid_token_short_circuits_before_remote_call() {
        let mut config = AuthConfig::new(SECRET);
        config.validate_url = Some(Url::parse("http://127.0.0.1:1/api/validate").unwrap());
        let resolver = IdentityResolver::new(config).unwrap();

        let decision = resolver
            .authenticate("/api/orders/1", Some("Bearer not-a-jwt"))
            .await;
        // An unreachable validator would have produced 503
        assert_eq!(
            decision,
            AuthDecision::denied(DenialKind::InvalidCredential, "Invalid token.")
        );
    }

    #[tokio::test]
    async fn test_valid_token_without_remote_check() {
        let header = format!("Bearer {}", valid_token());
        let decision = resolver().authenticate("/api/orders/1", Some(&header)).await;
        let identity = decision.identity().unwrap();
        assert_eq!(identity.subject, "u-1");
        assert_eq!(identity.email.as_deref(), Some("a@example.com"));
        assert!(identity.has_role("admin"));
        assert!(identity.has_permission("orders:read"));
    }

    #[tokio::test]
    async fn test_unreachable_validator_is_503_not_401() {
        let mut config = AuthConfig::new(SECRET);
        config.validate_url = Some(Url::parse("http://127.0.0.1:1/api/validate").unwrap());
        config.validate_timeout = Duration::from_millis(500);
        let resolver = IdentityResolver::new(config).unwrap();

        let header = format!("Bearer {}", valid_token());
        match resolver.authenticate("/api/orders/1", Some(&header)).await {
            AuthDecision::Denied(denial) => {
                assert_eq!(denial.kind, DenialKind::ValidatorUnavailable);
                assert_eq!(denial.status_code(), 503);
            }
            other => panic!("expected denial, got {:?}", other),
        }
    }

    #[test]
    fn test_merge_local_precedence() {
        let local = TokenClaims {
            id: Some("local-id".to_string()),
            role: Some("user".to_string()),
            ..Default::default()
        };
        let remote = RemoteUser {
            id: Some("remote-id".to_string()),
            email: Some("r@example.com".to_string()),
            role: Some("admin".to_string()),
            permissions: Some(vec!["a".to_string(), "b".to_string()]),
        };
        let identity = merge_claims(local, Some(remote), ClaimPrecedence::Local).unwrap();
        assert_eq!(identity.subject, "local-id");
        assert_eq!(identity.role.as_deref(), Some("user"));
        assert_eq!(identity.email.as_deref(), Some("r@example.com"));
        assert_eq!(identity.permissions.len(), 2);
    }

    #[test]
    fn test_merge_remote_precedence() {
        let local = TokenClaims {
            id: Some("local-id".to_string()),
            role: Some("user".to_string()),
            permissions: Some(vec!["local".to_string()]),
            ..Default::default()
        };
        let remote = RemoteUser {
            id: None,
            email: None,
            role: Some("admin".to_string()),
            permissions: None,
        };
        let identity = merge_claims(local, Some(remote), ClaimPrecedence::Remote).unwrap();
        assert_eq!(identity.subject, "local-id");
        assert_eq!(identity.role.as_deref(), Some("admin"));
        assert!(identity.has_permission("local"));
    }

    #[test]
    fn test_merge_without_subject_fails() {
        assert!(merge_claims(TokenClaims::default(), None, ClaimPrecedence::Local).is_none());
    }

    #[tokio::test]
    async fn test_token_without_subject_is_401() {
        let t = token(serde_json::json!({"exp": chrono::Utc::now().timestamp() + 3600}));
        let header = format!("Bearer {}", t);
        let decision = resolver().authenticate("/api/orders/1", Some(&header)).await;
        assert_eq!(
            decision,
            AuthDecision::denied(DenialKind::InvalidCredential, "Token has no subject.")
        );
    }
}
