/// Authentication module
///
/// Token issuance and validation, the signing secret, and password
/// verification for the login flow.

mod claims;
mod jwt;
mod password;
mod secret;
mod validation;

pub use claims::Claims;
pub use claims::TokenKind;
pub use claims::ACCESS_TOKEN_TTL_MINUTES;
pub use claims::REFRESH_TOKEN_TTL_DAYS;
pub use jwt::resolve_token;
pub use jwt::TokenProvider;
pub use password::hash_password;
pub use password::hash_password_with_cost;
pub use password::verify_password;
pub use secret::SigningSecret;
pub use validation::AuthFailure;
pub use validation::TokenValidation;
