//! Routing helpers for `/api/{service}/...` paths.
//!
//! Proxied requests carry the target service name as the first path
//! segment after [`API_PREFIX`]. These helpers centralise the
//! extraction and rewrite logic so the dispatcher, the access log and
//! tests all agree on it.

/// Fixed prefix in front of every proxied service path
pub const API_PREFIX: &str = "/api";

/// Path after `"/api/"`, or `None` for paths outside the prefix.
fn after_api_prefix(path: &str) -> Option<&str> {
    path.strip_prefix(API_PREFIX)?.strip_prefix('/')
}

/// Extract the service name from a proxied path.
///
/// ```
/// # use apigw_core::routing::service_name;
/// assert_eq!(service_name("/api/orders/123"), Some("orders"));
/// assert_eq!(service_name("/api/orders"), Some("orders"));
/// assert_eq!(service_name("/api/"), None);
/// assert_eq!(service_name("/health"), None);
/// ```
pub fn service_name(path: &str) -> Option<&str> {
    let rest = after_api_prefix(path)?;
    let name = rest.split('/').next().unwrap_or("");
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Strip `"/api/{service}"` from a path, only on a segment boundary.
///
/// Returns the remainder, which is empty or starts with `/`.
///
/// ```
/// # use apigw_core::routing::strip_service_prefix;
/// assert_eq!(strip_service_prefix("/api/orders/123", "orders"), Some("/123"));
/// assert_eq!(strip_service_prefix("/api/orders", "orders"), Some(""));
/// assert_eq!(strip_service_prefix("/api/orders-v2/1", "orders"), None);
/// ```
pub fn strip_service_prefix<'a>(path: &'a str, service: &str) -> Option<&'a str> {
    let rest = after_api_prefix(path)?.strip_prefix(service)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

/// Join a base path and a remainder into an absolute path.
fn join_paths(base: &str, rest: &str) -> String {
    let base = base.trim_end_matches('/');
    let mut joined = String::with_capacity(base.len() + rest.len() + 1);
    if !base.is_empty() && !base.starts_with('/') {
        joined.push('/');
    }
    joined.push_str(base);
    joined.push_str(rest);
    if joined.is_empty() {
        joined.push('/');
    }
    joined
}

/// Rewrite a proxied path for forwarding.
///
/// Replaces `"/api/{service}"` with `base_path`. Returns `None` when the
/// path does not belong to `service`.
///
/// ```
/// # use apigw_core::routing::rewrite_path;
/// assert_eq!(rewrite_path("/api/orders/123", "orders", "/api"), Some("/api/123".to_string()));
/// assert_eq!(rewrite_path("/api/auth/login", "auth", "/auth"), Some("/auth/login".to_string()));
/// assert_eq!(rewrite_path("/api/orders", "orders", ""), Some("/".to_string()));
/// assert_eq!(rewrite_path("/api/products/1", "orders", "/api"), None);
/// ```
pub fn rewrite_path(path: &str, service: &str, base_path: &str) -> Option<String> {
    strip_service_prefix(path, service).map(|rest| join_paths(base_path, rest))
}

/// Inverse of [`rewrite_path`]: map a forwarded path back to the
/// gateway-facing path.
///
/// ```
/// # use apigw_core::routing::restore_path;
/// assert_eq!(restore_path("/api/123", "orders", "/api"), Some("/api/orders/123".to_string()));
/// assert_eq!(restore_path("/other/123", "orders", "/api"), None);
/// ```
pub fn restore_path(rewritten: &str, service: &str, base_path: &str) -> Option<String> {
    let base = join_paths(base_path, "");
    let rest = if base == "/" {
        if rewritten == "/" {
            ""
        } else {
            rewritten
        }
    } else {
        let rest = rewritten.strip_prefix(base.as_str())?;
        if !rest.is_empty() && !rest.starts_with('/') {
            return None;
        }
        rest
    };
    Some(format!("{}/{}{}", API_PREFIX, service, rest))
}
