//! Service registry
//!
//! An immutable name -> [`ServiceEntry`] map built once at startup and
//! shared by reference (typically behind an `Arc`). Lookups never mutate,
//! so no locking is involved.

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::error::GatewayError;
use crate::models::ServiceEntry;

/// Errors raised while building a registry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Duplicate service name: {0}")]
    DuplicateService(String),

    #[error("Invalid service '{service}': {reason}")]
    InvalidEntry { service: String, reason: String },
}

/// Lookup of a name that is not registered
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Service not found: {0}")]
pub struct ServiceNotFound(pub String);

impl From<ServiceNotFound> for GatewayError {
    fn from(err: ServiceNotFound) -> Self {
        GatewayError::service_not_found(err.0)
    }
}

/// Static mapping of service name to routing/auth/health policy
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    /// Entries in registration order
    entries: Vec<(String, ServiceEntry)>,
    /// Name -> position in `entries`
    index: HashMap<String, usize>,
}

impl ServiceRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Get the entry registered under `name`
    pub fn lookup(&self, name: &str) -> Result<&ServiceEntry, ServiceNotFound> {
        self.index
            .get(name)
            .map(|&i| &self.entries[i].1)
            .ok_or_else(|| ServiceNotFound(name.to_string()))
    }

    /// Like [`lookup`](Self::lookup), also returning the registered name
    pub fn get_key_value(&self, name: &str) -> Result<(&str, &ServiceEntry), ServiceNotFound> {
        self.index
            .get(name)
            .map(|&i| {
                let (name, entry) = &self.entries[i];
                (name.as_str(), entry)
            })
            .ok_or_else(|| ServiceNotFound(name.to_string()))
    }

    /// Whether `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Registered names, in registration order
    pub fn list_names(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Iterate over `(name, entry)` pairs in registration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ServiceEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builder for [`ServiceRegistry`]
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    registry: ServiceRegistry,
}

impl RegistryBuilder {
    /// Register `entry` under `name`.
    ///
    /// Names must be a single non-empty path segment and unique.
    pub fn register(
        mut self,
        name: impl Into<String>,
        entry: ServiceEntry,
    ) -> Result<Self, RegistryError> {
        let name = name.into();
        validate(&name, &entry)?;

        if self.registry.index.contains_key(&name) {
            return Err(RegistryError::DuplicateService(name));
        }

        debug!(service = %name, url = %entry.url, "Registering service");
        let position = self.registry.entries.len();
        self.registry.index.insert(name.clone(), position);
        self.registry.entries.push((name, entry));
        Ok(self)
    }

    pub fn build(self) -> ServiceRegistry {
        self.registry
    }
}

fn validate(name: &str, entry: &ServiceEntry) -> Result<(), RegistryError> {
    let invalid = |reason: &str| RegistryError::InvalidEntry {
        service: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("name must not be empty"));
    }
    if name.contains('/') || name.contains('?') {
        return Err(invalid("name must be a single path segment"));
    }
    if !entry.health_path.starts_with('/') {
        return Err(invalid("health path must start with '/'"));
    }
    if entry.timeout.is_some_and(|t| t.is_zero()) {
        return Err(invalid("timeout must be greater than zero"));
    }
    if !matches!(entry.url.scheme(), "http" | "https") {
        return Err(invalid("url must use http or https"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use url::Url;

    fn entry(port: u16) -> ServiceEntry {
        ServiceEntry::new(Url::parse(&format!("http://localhost:{}", port)).unwrap())
    }

    fn registry() -> ServiceRegistry {
        ServiceRegistry::builder()
            .register("auth", entry(3001).with_requires_auth(false))
            .unwrap()
            .register("orders", entry(3003).with_timeout(Duration::from_millis(15000)))
            .unwrap()
            .register("products", entry(3004))
            .unwrap()
            .build()
    }

    #[test]
    fn test_lookup_returns_configured_entry() {
        let reg = registry();
        let orders = reg.lookup("orders").unwrap();
        assert_eq!(orders, &entry(3003).with_timeout(Duration::from_millis(15000)));
        assert!(!reg.lookup("auth").unwrap().requires_auth);
    }

    #[test]
    fn test_lookup_unknown_is_not_found() {
        let reg = registry();
        assert_eq!(
            reg.lookup("unknown"),
            Err(ServiceNotFound("unknown".to_string()))
        );
        assert_eq!(reg.lookup(""), Err(ServiceNotFound(String::new())));
    }

    #[test]
    fn test_list_names_in_insertion_order() {
        assert_eq!(registry().list_names(), vec!["auth", "orders", "products"]);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let result = ServiceRegistry::builder()
            .register("orders", entry(1))
            .unwrap()
            .register("orders", entry(2));
        assert_eq!(
            result.unwrap_err(),
            RegistryError::DuplicateService("orders".to_string())
        );
    }

    #[test]
    fn test_invalid_names_rejected() {
        for name in ["", "a/b", "a?b"] {
            assert!(ServiceRegistry::builder().register(name, entry(1)).is_err());
        }
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = ServiceRegistry::builder().register("x", entry(1).with_timeout(Duration::ZERO));
        assert!(matches!(result, Err(RegistryError::InvalidEntry { .. })));
    }

    #[test]
    fn test_not_found_converts_to_404() {
        let err: GatewayError = ServiceNotFound("ghost".to_string()).into();
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.service(), Some("ghost"));
    }
}
