//! Authorization guards
//!
//! Composable checks applied after the identity resolver. Each requires
//! an `Allowed` decision carrying an identity; without one the guard
//! answers 401 and never evaluates the role or permission.

use apigw_core::{AuthDecision, GatewayError, Identity, ServiceEntry};

fn authenticated(decision: &AuthDecision) -> Result<&Identity, GatewayError> {
    decision
        .identity()
        .ok_or_else(|| GatewayError::Unauthorized("Authentication required.".to_string()))
}

/// Deny with 403 unless the caller holds `role`
pub fn require_role<'a>(decision: &'a AuthDecision, role: &str) -> Result<&'a Identity, GatewayError> {
    let identity = authenticated(decision)?;
    if identity.has_role(role) {
        Ok(identity)
    } else {
        Err(GatewayError::Forbidden(format!(
            "Access denied. Required role: {}",
            role
        )))
    }
}

/// Deny with 403 unless the caller holds `permission`
pub fn require_permission<'a>(
    decision: &'a AuthDecision,
    permission: &str,
) -> Result<&'a Identity, GatewayError> {
    let identity = authenticated(decision)?;
    if identity.has_permission(permission) {
        Ok(identity)
    } else {
        Err(GatewayError::Forbidden(format!(
            "Access denied. Required permission: {}",
            permission
        )))
    }
}

/// Apply the role and permission requirements configured on `entry`.
///
/// Entries without requirements pass any decision through.
pub fn enforce_policy(decision: &AuthDecision, entry: &ServiceEntry) -> Result<(), GatewayError> {
    if let Some(role) = &entry.required_role {
        require_role(decision, role)?;
    }
    for permission in &entry.required_permissions {
        require_permission(decision, permission)?;
    }
    Ok(())
}
