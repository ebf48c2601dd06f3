use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Supplies the authenticated external identity of the current caller.
///
/// Every core operation receives one of these explicitly and refuses to
/// touch the store when `identity()` is `None`.
pub trait IdentityResolver {
    fn identity(&self) -> Option<&str>;
}

impl IdentityResolver for String {
    fn identity(&self) -> Option<&str> {
        Some(self.as_str())
    }
}

impl IdentityResolver for Option<String> {
    fn identity(&self) -> Option<&str> {
        self.as_deref()
    }
}

/// Claims issued by the identity provider. `sub` is the stable opaque
/// identity the profile is keyed on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
}

impl Claims {
    pub fn new(subject: impl Into<String>, duration_secs: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: subject.into(),
            iat: now,
            exp: now + duration_secs,
            jti: Uuid::now_v7(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub identity: String,
    pub token_id: Uuid,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            identity: claims.sub,
            token_id: claims.jti,
        }
    }
}

impl IdentityResolver for AuthUser {
    fn identity(&self) -> Option<&str> {
        Some(self.identity.as_str())
    }
}
