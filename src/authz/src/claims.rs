//! Claim normalization from decoded identity tokens

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{AuthzError, Result};

/// Facts asserted by a verified identity: the allowed topic pattern, the
/// realm role, and the token expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedClaims {
    /// Topic pattern the identity may touch; `"#"` means any topic
    pub allowed_topic: String,

    /// Role name, resolved through the role table at decision time
    pub role: String,

    /// Token expiry as epoch seconds; `None` when the token carried none
    pub expires_at: Option<i64>,
}

impl VerifiedClaims {
    /// Normalizes a decoded token payload into claims.
    ///
    /// Requires a `topic` grant and at least one realm role under
    /// `realm_access.roles`. A user is assumed to carry a single realm
    /// role; only the first is used. A missing `exp` is tolerated and
    /// leaves the record without an expiry.
    pub fn from_token_payload(payload: &Value) -> Result<Self> {
        let allowed_topic = payload
            .get("topic")
            .and_then(Value::as_str)
            .ok_or_else(|| AuthzError::InvalidClaims("no topic grant in token".into()))?
            .to_string();

        let role = payload
            .pointer("/realm_access/roles/0")
            .and_then(Value::as_str)
            .ok_or_else(|| AuthzError::InvalidClaims("no realm role in token".into()))?
            .to_string();

        let expires_at = payload.get("exp").and_then(Value::as_i64);
        if expires_at.is_none() {
            warn!("token carries no expiry claim");
        }

        debug!(topic = %allowed_topic, role = %role, expires_at = ?expires_at, "normalized claims");

        Ok(Self {
            allowed_topic,
            role,
            expires_at,
        })
    }
}

/// Pulls the encoded access token out of an identity-provider response
/// body.
///
/// The provider answers either `{"access_token": "..."}` or an
/// `{"error": "..."}` document.
pub fn extract_access_token(body: &str) -> Result<String> {
    let root: Value = serde_json::from_str(body)
        .map_err(|e| AuthzError::InvalidClaims(format!("response is not JSON: {e}")))?;

    match root.get("access_token").and_then(Value::as_str) {
        Some(token) => Ok(token.to_string()),
        None => {
            let detail = root
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("no access_token present");
            Err(AuthzError::InvalidClaims(format!(
                "token missing from response: {detail}"
            )))
        }
    }
}
