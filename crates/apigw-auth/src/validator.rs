//! Remote identity-validation client

use std::time::Duration;

use apigw_core::{AuthDenial, DenialKind};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::Url;

/// Bound on a single remote validation call
pub const DEFAULT_VALIDATE_TIMEOUT: Duration = Duration::from_millis(5000);

/// User attributes returned by the identity service
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RemoteUser {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub permissions: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct ValidateResponse {
    user: RemoteUser,
}

/// Cross-checks bearer tokens against the identity service's
/// validation endpoint (`GET <url>` with the same bearer token)
#[derive(Debug, Clone)]
pub struct RemoteValidator {
    client: Client,
    url: Url,
    timeout: Duration,
}

impl RemoteValidator {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url,
            timeout,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Validate `token` remotely.
    ///
    /// Unreachable or slow endpoints are `ValidatorUnavailable`, an explicit
    /// 401/403 is `InvalidCredential`, an unreadable 2xx body is
    /// `ValidatorFault`.
    #[instrument(skip(self, token), fields(url = %self.url))]
    pub async fn validate(&self, token: &str) -> Result<RemoteUser, AuthDenial> {
        let response = self
            .client
            .get(self.url.clone())
            .bearer_auth(token)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, timeout = e.is_timeout(), "Identity validation request failed");
                AuthDenial::new(
                    DenialKind::ValidatorUnavailable,
                    "Authentication service unavailable.",
                )
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            debug!(status = status.as_u16(), "Identity service rejected token");
            return Err(AuthDenial::new(DenialKind::InvalidCredential, "Invalid token."));
        }
        if !status.is_success() {
            warn!(status = status.as_u16(), "Identity service returned an error status");
            return Err(AuthDenial::new(
                DenialKind::ValidatorUnavailable,
                "Authentication service unavailable.",
            ));
        }

        let body = response.json::<ValidateResponse>().await.map_err(|e| {
            warn!(error = %e, "Identity service returned an unreadable body");
            AuthDenial::new(
                DenialKind::ValidatorFault,
                "Authentication service returned an invalid response.",
            )
        })?;

        Ok(body.user)
    }
}
