/// Token validation outcome
///
/// Validation never fails with an error. It always resolves to one of these
/// variants; every non-valid variant maps to an `AuthFailure` that gets
/// recorded on the request context for error reporting.

use crate::auth::claims::Claims;
use crate::error::AuthError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenValidation {
    /// Persisted, matching, correctly signed and not expired
    Valid(Claims),
    Expired,
    /// Not persisted, persisted value differs, malformed or bad signature
    Invalid,
    /// Store failure or any other unexpected error
    Unknown,
}

impl TokenValidation {
    pub fn is_valid(&self) -> bool {
        matches!(self, TokenValidation::Valid(_))
    }

    pub fn claims(&self) -> Option<&Claims> {
        match self {
            TokenValidation::Valid(claims) => Some(claims),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<AuthFailure> {
        match self {
            TokenValidation::Valid(_) => None,
            TokenValidation::Expired => Some(AuthFailure::Expired),
            TokenValidation::Invalid => Some(AuthFailure::Invalid),
            TokenValidation::Unknown => Some(AuthFailure::Unknown),
        }
    }
}

/// Reason a token was rejected.
///
/// Stored in the request extensions by the JWT middleware; the type itself
/// is the attribute key downstream error reporting looks up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    Expired,
    Invalid,
    Unknown,
}

impl AuthFailure {
    pub fn reason(self) -> &'static str {
        match self {
            AuthFailure::Expired => "token expired",
            AuthFailure::Invalid => "invalid token",
            AuthFailure::Unknown => "unknown error",
        }
    }
}

impl AuthFailure {
    /// Failure recorded for a rejected request, if `error` is a token failure
    pub fn from_error(error: &AuthError) -> Option<Self> {
        match error {
            AuthError::TokenExpired => Some(AuthFailure::Expired),
            AuthError::TokenInvalid => Some(AuthFailure::Invalid),
            AuthError::TokenUnknown => Some(AuthFailure::Unknown),
            _ => None,
        }
    }
}

impl From<AuthFailure> for AuthError {
    fn from(failure: AuthFailure) -> Self {
        match failure {
            AuthFailure::Expired => AuthError::TokenExpired,
            AuthFailure::Invalid => AuthError::TokenInvalid,
            AuthFailure::Unknown => AuthError::TokenUnknown,
        }
    }
}
