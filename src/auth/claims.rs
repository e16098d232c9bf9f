/// JWT Claims structure
///
/// Payload of every token this service signs: the subject, the role labels
/// granted at issuance, and the standard `iat`/`exp` NumericDate claims.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lifetime of an access token
pub const ACCESS_TOKEN_TTL_MINUTES: i64 = 30;
/// Lifetime of a refresh token
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 14;

/// The two kinds of token the provider issues. They share a claims layout
/// and differ only in lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn lifetime(self) -> Duration {
        match self {
            TokenKind::Access => Duration::minutes(ACCESS_TOKEN_TTL_MINUTES),
            TokenKind::Refresh => Duration::days(REFRESH_TOKEN_TTL_DAYS),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user identity)
    pub sub: String,
    /// Role labels, e.g. `ROLE_USER`
    #[serde(default)]
    pub roles: Vec<String>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Build claims for `kind` issued at `now`
    pub fn new(identity: &str, roles: &[String], kind: TokenKind, now: DateTime<Utc>) -> Self {
        let iat = now.timestamp();
        Self {
            sub: identity.to_string(),
            roles: roles.to_vec(),
            iat,
            exp: iat + kind.lifetime().num_seconds(),
        }
    }

    /// Expired means the expiration lies strictly before `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp < now.timestamp()
    }
}
