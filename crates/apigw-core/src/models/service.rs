//! Service registry entry model

use std::time::Duration;

use url::Url;

/// Health path used when an entry does not configure one
pub const DEFAULT_HEALTH_PATH: &str = "/health";

/// Timeout applied to forward calls and probes when an entry has none
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Routing, auth and health policy for one named backend.
///
/// Entries are built once at startup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEntry {
    /// Upstream base URL (scheme, host, port)
    pub url: Url,
    /// Path spliced in place of `/api/{service}` when forwarding
    pub base_path: Option<String>,
    /// Path probed for liveness, relative to `url`
    pub health_path: String,
    /// Timeout for forward calls and health probes
    pub timeout: Option<Duration>,
    /// Advisory retry count for an external resilience layer (not enforced here)
    pub retries: u32,
    /// Whether a verified identity is mandatory for this service
    pub requires_auth: bool,
    /// Role the caller must hold, if any
    pub required_role: Option<String>,
    /// Permissions the caller must hold, all of them
    pub required_permissions: Vec<String>,
}

impl ServiceEntry {
    /// Create an entry pointing at `url` with default policy.
    ///
    /// Defaults: no base path, `/health` health path, default timeout,
    /// no retries, authentication required.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            base_path: None,
            health_path: DEFAULT_HEALTH_PATH.to_string(),
            timeout: None,
            retries: 0,
            requires_auth: true,
            required_role: None,
            required_permissions: Vec::new(),
        }
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    pub fn with_health_path(mut self, health_path: impl Into<String>) -> Self {
        self.health_path = health_path.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_requires_auth(mut self, requires_auth: bool) -> Self {
        self.requires_auth = requires_auth;
        self
    }

    pub fn with_required_role(mut self, role: impl Into<String>) -> Self {
        self.required_role = Some(role.into());
        self
    }

    pub fn with_required_permission(mut self, permission: impl Into<String>) -> Self {
        self.required_permissions.push(permission.into());
        self
    }

    /// Timeout to apply to outbound calls for this entry
    pub fn effective_timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Base path, empty when unset
    pub fn base_path(&self) -> &str {
        self.base_path.as_deref().unwrap_or("")
    }

    /// Absolute URL for `path_and_query` on this upstream.
    ///
    /// Concatenates rather than using [`Url::join`], so a path already
    /// present on the upstream URL is kept.
    pub fn upstream_url(&self, path_and_query: &str) -> String {
        format!("{}{}", self.url.as_str().trim_end_matches('/'), path_and_query)
    }

    /// Absolute URL of the liveness endpoint
    pub fn health_url(&self) -> String {
        self.upstream_url(&self.health_path)
    }
}
