use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub user_uuid: Uuid,
    pub exp: usize,
}

/// `Decode(token) -> {user_uuid, exp} | Expired | Invalid` (§6 Auth contract).
pub fn decode_session(token: &str, secret: &str) -> Result<SessionClaims, AuthError> {
    let data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
        other => AuthError::Invalid(other.to_string()),
    })?;
    Ok(data.claims)
}

/// Pulls `session_id` out of a raw `Cookie:` header value.
pub fn extract_session_cookie(header_value: &str) -> Option<&str> {
    header_value.split(';').find_map(|part| {
        let part = part.trim();
        part.strip_prefix("session_id=")
    })
}

/// Resolves a channel's identity: a valid cookie yields the carried
/// user UUID, anything else (§7 AuthError never tears the channel down)
/// mints a fresh guest identity.
pub fn resolve_identity(cookie_header: Option<&str>, secret: &str) -> Uuid {
    cookie_header
        .and_then(extract_session_cookie)
        .and_then(|token| decode_session(token, secret).ok())
        .map(|claims| claims.user_uuid)
        .unwrap_or_else(Uuid::new_v4)
}
