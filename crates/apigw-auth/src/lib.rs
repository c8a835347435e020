//! apigw-auth - Identity resolver (auth gate) for the API gateway
//!
//! Decides, per request, whether a caller is authenticated and produces
//! an [`AuthDecision`](apigw_core::AuthDecision):
//!
//! 1. public-route bypass (prefix match, evaluated first)
//! 2. bearer extraction from the `Authorization` header
//! 3. local JWT verification against the shared secret
//! 4. optional remote cross-check against the identity service
//! 5. claim merge into an [`Identity`](apigw_core::Identity)
//!
//! The [`guards`] module holds the role/permission checks applied after
//! a successful decision.
//!
//! # Usage
//!
//! ```rust,ignore
//! use apigw_auth::{AuthConfig, IdentityResolver};
//!
//! let resolver = IdentityResolver::new(AuthConfig::new("secret"))?;
//! let decision = resolver
//!     .authenticate("/api/orders/1", Some("Bearer eyJhbGciOi..."))
//!     .await;
//! ```

mod claims;
pub mod guards;
mod resolver;
mod validator;

pub use claims::{TokenClaims, TokenVerifier};
pub use guards::{enforce_policy, require_permission, require_role};
pub use resolver::{bearer_token, AuthConfig, ClaimPrecedence, IdentityResolver, DEFAULT_PUBLIC_ROUTES};
pub use validator::{RemoteUser, RemoteValidator, DEFAULT_VALIDATE_TIMEOUT};
