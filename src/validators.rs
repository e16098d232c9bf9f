/// Input validators for the login form
///
/// User ids are checked before they reach a query: length limits against
/// oversized input, and a restricted character set.

use regex::Regex;
use lazy_static::lazy_static;

use crate::error::ValidationError;

const MIN_USER_ID_LENGTH: usize = 3;
const MAX_USER_ID_LENGTH: usize = 64;
const MAX_PASSWORD_LENGTH: usize = 128; // bcrypt only reads 72 bytes anyway

lazy_static! {
    static ref USER_ID_REGEX: Regex = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._@-]*$").unwrap();
}

/// Validates a user id and returns it trimmed
pub fn is_valid_user_id(user_id: &str) -> Result<String, ValidationError> {
    let trimmed = user_id.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("user_id".to_string()));
    }

    if trimmed.len() < MIN_USER_ID_LENGTH {
        return Err(ValidationError::TooShort("user_id".to_string(), MIN_USER_ID_LENGTH));
    }

    if trimmed.len() > MAX_USER_ID_LENGTH {
        return Err(ValidationError::TooLong("user_id".to_string(), MAX_USER_ID_LENGTH));
    }

    if !USER_ID_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("user_id".to_string()));
    }

    Ok(trimmed.to_string())
}

/// Passwords are not trimmed; only emptiness and length are checked
pub fn is_valid_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::EmptyField("password".to_string()));
    }

    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong("password".to_string(), MAX_PASSWORD_LENGTH));
    }

    Ok(())
}
