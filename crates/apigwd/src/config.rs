//! Gateway configuration
//!
//! Loaded once at startup: the TOML file (or the built-in service set
//! when none is given), then environment overrides. Command-line flags
//! are applied on top by `main`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use apigw_auth::{AuthConfig, ClaimPrecedence, DEFAULT_PUBLIC_ROUTES};
use apigw_core::{RegistryError, ServiceEntry, ServiceRegistry, DEFAULT_HEALTH_PATH};
use apigw_proxy::DEFAULT_BODY_LIMIT;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

/// Secret used when none is configured. Development only.
pub const DEV_JWT_SECRET: &str = "your-secret-key";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl ConfigError {
    fn invalid(key: impl Into<String>, reason: impl ToString) -> Self {
        ConfigError::Invalid {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub body_limit_bytes: usize,
    /// Log the `x-forwarded-for` caller IP instead of the peer address
    pub trust_forwarded_for: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            allowed_origins: vec!["http://localhost:3000".to_string()],
            body_limit_bytes: DEFAULT_BODY_LIMIT,
            trust_forwarded_for: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthSection {
    pub jwt_secret: Option<String>,
    pub validate_url: Option<String>,
    pub validate_timeout_ms: u64,
    pub public_routes: Vec<String>,
    pub claim_precedence: ClaimPrecedence,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            validate_url: None,
            validate_timeout_ms: 5000,
            public_routes: DEFAULT_PUBLIC_ROUTES.iter().map(|r| r.to_string()).collect(),
            claim_precedence: ClaimPrecedence::Local,
        }
    }
}

fn default_health_path() -> String {
    DEFAULT_HEALTH_PATH.to_string()
}

fn default_true() -> bool {
    true
}

/// One `[services.<name>]` table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    pub url: String,
    pub base_path: Option<String>,
    #[serde(default = "default_health_path")]
    pub health_path: String,
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub retries: u32,
    #[serde(default = "default_true")]
    pub require_auth: bool,
    pub required_role: Option<String>,
    #[serde(default)]
    pub required_permissions: Vec<String>,
}

impl ServiceConfig {
    fn local(port: u16, base_path: &str, timeout_ms: u64, require_auth: bool) -> Self {
        Self {
            url: format!("http://localhost:{}", port),
            base_path: Some(base_path.to_string()),
            health_path: default_health_path(),
            timeout_ms: Some(timeout_ms),
            retries: 0,
            require_auth,
            required_role: None,
            required_permissions: Vec::new(),
        }
    }

    fn to_entry(&self, name: &str) -> Result<ServiceEntry, ConfigError> {
        let url = Url::parse(&self.url)
            .map_err(|e| ConfigError::invalid(format!("services.{}.url", name), e))?;

        let mut entry = ServiceEntry::new(url)
            .with_health_path(self.health_path.clone())
            .with_retries(self.retries)
            .with_requires_auth(self.require_auth);
        if let Some(base_path) = &self.base_path {
            entry = entry.with_base_path(base_path.clone());
        }
        if let Some(timeout_ms) = self.timeout_ms {
            if timeout_ms == 0 {
                return Err(ConfigError::invalid(
                    format!("services.{}.timeout_ms", name),
                    "must be greater than zero",
                ));
            }
            entry = entry.with_timeout(Duration::from_millis(timeout_ms));
        }
        if let Some(role) = &self.required_role {
            entry = entry.with_required_role(role.clone());
        }
        for permission in &self.required_permissions {
            entry = entry.with_required_permission(permission.clone());
        }
        Ok(entry)
    }
}

/// The built-in service set used when no config file is given
pub fn default_services() -> Vec<(String, ServiceConfig)> {
    [
        ("auth", ServiceConfig::local(3001, "/auth", 5000, false)),
        ("users", ServiceConfig::local(3002, "/api", 10000, true)),
        ("orders", ServiceConfig::local(3003, "/api", 15000, true)),
        ("products", ServiceConfig::local(3004, "/api", 10000, false)),
        ("payments", ServiceConfig::local(3005, "/api", 20000, true)),
        ("notifications", ServiceConfig::local(3006, "/api", 5000, true)),
        ("analytics", ServiceConfig::local(3007, "/api", 10000, true)),
    ]
    .into_iter()
    .map(|(name, config)| (name.to_string(), config))
    .collect()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    server: ServerConfig,
    auth: AuthSection,
    services: Option<toml::Table>,
}

/// Complete gateway configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub auth: AuthSection,
    /// Services in registration order
    pub services: Vec<(String, ServiceConfig)>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthSection::default(),
            services: default_services(),
        }
    }
}

impl GatewayConfig {
    /// Load from `path` (or defaults) and apply the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                info!(path = %path.display(), "Loading config file");
                let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml_str(&content)?
            }
            None => {
                info!("No config file given, using built-in service set");
                Self::default()
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a TOML document. A missing `[services]` section selects the
    /// built-in service set; services keep file order.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content)?;

        let services = match file.services {
            Some(table) => table
                .into_iter()
                .map(|(name, value)| {
                    let service: ServiceConfig = value.try_into()?;
                    Ok((name, service))
                })
                .collect::<Result<Vec<_>, toml::de::Error>>()?,
            None => default_services(),
        };

        Ok(Self {
            server: file.server,
            auth: file.auth,
            services,
        })
    }

    /// Apply environment overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid("PORT", e))?;
        }
        if let Some(secret) = lookup("JWT_SECRET") {
            self.auth.jwt_secret = Some(secret);
        }
        if let Some(auth_url) = lookup("AUTH_SERVICE_URL") {
            self.auth.validate_url = Some(format!("{}/api/validate", auth_url.trim_end_matches('/')));
        }
        if let Some(origins) = lookup("ALLOWED_ORIGINS") {
            self.server.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
        }
        for (name, service) in &mut self.services {
            let key = format!("{}_SERVICE_URL", name.to_uppercase().replace('-', "_"));
            if let Some(url) = lookup(&key) {
                service.url = url;
            }
        }
        Ok(())
    }

    /// Build the immutable service registry
    pub fn registry(&self) -> Result<ServiceRegistry, ConfigError> {
        let mut builder = ServiceRegistry::builder();
        for (name, service) in &self.services {
            builder = builder.register(name.clone(), service.to_entry(name)?)?;
        }
        Ok(builder.build())
    }

    /// Identity resolver settings
    pub fn auth_config(&self) -> Result<AuthConfig, ConfigError> {
        let secret = match self.auth.jwt_secret.as_deref().map(str::trim) {
            Some(secret) if !secret.is_empty() => secret.to_string(),
            _ => {
                warn!("No JWT secret configured, using the development default");
                DEV_JWT_SECRET.to_string()
            }
        };

        if self.auth.validate_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "auth.validate_timeout_ms",
                "must be greater than zero",
            ));
        }

        let validate_url = self
            .auth
            .validate_url
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|e| ConfigError::invalid("auth.validate_url", e))?;

        let mut auth = AuthConfig::new(secret);
        auth.public_routes = self.auth.public_routes.clone();
        auth.validate_url = validate_url;
        auth.validate_timeout = Duration::from_millis(self.auth.validate_timeout_ms);
        auth.claim_precedence = self.auth.claim_precedence;
        Ok(auth)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;

    const SAMPLE: &str = r#"
[server]
port = 8080
allowed_origins = ["https://app.example.com"]

[auth]
jwt_secret = "s3cret"
validate_url = "http://auth.internal:3001/api/validate"
claim_precedence = "remote"

[services.orders]
url = "http://orders.internal:3003"
base_path = "/api"
timeout_ms = 15000
required_role = "admin"
required_permissions = ["orders:read"]

[services.catalog]
url = "http://catalog.internal:3010"
require_auth = false
"#;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parse_sample() {
        let config = GatewayConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.auth.claim_precedence, ClaimPrecedence::Remote);
        assert!(!config.server.trust_forwarded_for);

        let names: Vec<&str> = config.services.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["orders", "catalog"]);

        let registry = config.registry().unwrap();
        let orders = registry.lookup("orders").unwrap();
        assert_eq!(orders.timeout, Some(Duration::from_millis(15000)));
        assert_eq!(orders.required_role.as_deref(), Some("admin"));
        assert!(orders.requires_auth);

        let catalog = registry.lookup("catalog").unwrap();
        assert!(!catalog.requires_auth);
        assert_eq!(catalog.health_path, "/health");
        assert_eq!(catalog.timeout, None);
    }

    #[test]
    fn test_default_service_set() {
        let config = GatewayConfig::from_toml_str("").unwrap();
        let registry = config.registry().unwrap();
        assert_eq!(
            registry.list_names(),
            vec!["auth", "users", "orders", "products", "payments", "notifications", "analytics"]
        );

        let auth = registry.lookup("auth").unwrap();
        assert!(!auth.requires_auth);
        assert_eq!(auth.base_path(), "/auth");
        assert_eq!(auth.url.as_str(), "http://localhost:3001/");

        let payments = registry.lookup("payments").unwrap();
        assert_eq!(payments.timeout, Some(Duration::from_millis(20000)));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = GatewayConfig::default();
        config
            .apply_env(env(&[
                ("PORT", "9000"),
                ("JWT_SECRET", "from-env"),
                ("AUTH_SERVICE_URL", "http://auth:4000/"),
                ("ALLOWED_ORIGINS", "https://a.example, https://b.example"),
                ("ORDERS_SERVICE_URL", "http://orders:4003"),
            ]))
            .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.auth.jwt_secret.as_deref(), Some("from-env"));
        assert_eq!(
            config.auth.validate_url.as_deref(),
            Some("http://auth:4000/api/validate")
        );
        assert_eq!(
            config.server.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
        // AUTH_SERVICE_URL also moves the auth service itself
        let url_of = |name: &str| {
            config
                .services
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, s)| s.url.clone())
                .unwrap()
        };
        assert_eq!(url_of("orders"), "http://orders:4003");
        assert_eq!(url_of("auth"), "http://auth:4000/");
    }

    #[test]
    fn test_invalid_port_env() {
        let mut config = GatewayConfig::default();
        let err = config.apply_env(env(&[("PORT", "not-a-port")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "PORT"));
    }

    #[test]
    fn test_dev_secret_fallback() {
        let config = GatewayConfig::default();
        assert_eq!(config.auth_config().unwrap().jwt_secret, DEV_JWT_SECRET);
    }

    #[test]
    fn test_rejects_bad_values() {
        let bad_url = "[services.orders]\nurl = \"not a url\"\n";
        let err = GatewayConfig::from_toml_str(bad_url)
            .unwrap()
            .registry()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "services.orders.url"));

        let zero = "[services.orders]\nurl = \"http://o:1\"\ntimeout_ms = 0\n";
        assert!(GatewayConfig::from_toml_str(zero).unwrap().registry().is_err());

        let unknown = "[services.orders]\nurl = \"http://o:1\"\ntimeout = 5\n";
        assert!(matches!(
            GatewayConfig::from_toml_str(unknown),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    #[serial]
    fn test_load_file_with_process_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        std::env::set_var("CATALOG_SERVICE_URL", "http://catalog-override:1");
        let loaded = GatewayConfig::load(Some(file.path()));
        std::env::remove_var("CATALOG_SERVICE_URL");

        let config = loaded.unwrap();
        let (_, catalog) = config.services.iter().find(|(n, _)| n == "catalog").unwrap();
        assert_eq!(catalog.url, "http://catalog-override:1");
    }

    #[test]
    fn test_missing_file() {
        let err = GatewayConfig::load(Some(Path::new("/nonexistent/apigw.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
