//! Local JWT verification

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Claims the gateway reads from a bearer token.
///
/// Every field is optional; gaps can be filled by the remote
/// validation response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject id as issued by the auth service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Standard subject claim, used when `id` is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
}

impl TokenClaims {
    /// Subject id, preferring `id` over `sub`
    pub fn subject(&self) -> Option<&str> {
        self.id
            .as_deref()
            .or(self.sub.as_deref())
            .filter(|s| !s.is_empty())
    }
}

/// Verifies HS256 tokens signed with the shared secret.
///
/// Signature and `exp` are both checked; `exp` is mandatory.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn hs256(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<TokenClaims, jsonwebtoken::errors::Error> {
        decode::<TokenClaims>(token, &self.key, &self.validation).map(|data| data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &[u8] = b"test-secret";

    fn sign(claims: serde_json::Value, secret: &[u8]) -> String {
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    fn future_exp() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    #[test]
    fn test_valid_token() {
        let token = sign(
            serde_json::json!({"id": "u-1", "role": "admin", "exp": future_exp()}),
            SECRET,
        );
        let claims = TokenVerifier::hs256(SECRET).verify(&token).unwrap();
        assert_eq!(claims.subject(), Some("u-1"));
        assert_eq!(claims.role.as_deref(), Some("admin"));
    }

    #[test]
    fn test_sub_used_when_id_missing() {
        let token = sign(serde_json::json!({"sub": "u-2", "exp": future_exp()}), SECRET);
        let claims = TokenVerifier::hs256(SECRET).verify(&token).unwrap();
        assert_eq!(claims.subject(), Some("u-2"));
    }

    #[test]
    fn test_expired_token_rejected() {
        let exp = chrono::Utc::now().timestamp() - 3600;
        let token = sign(serde_json::json!({"id": "u-1", "exp": exp}), SECRET);
        assert!(TokenVerifier::hs256(SECRET).verify(&token).is_err());
    }

    #[test]
    fn test_forged_signature_rejected() {
        let token = sign(serde_json::json!({"id": "u-1", "exp": future_exp()}), b"other");
        assert!(TokenVerifier::hs256(SECRET).verify(&token).is_err());
    }

    #[test]
    fn test_token_without_exp_rejected() {
        let token = sign(serde_json::json!({"id": "u-1"}), SECRET);
        assert!(TokenVerifier::hs256(SECRET).verify(&token).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(TokenVerifier::hs256(SECRET).verify("not.a.jwt").is_err());
    }
}
