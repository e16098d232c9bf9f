/// JWT Token Provider
///
/// Issues access and refresh tokens, extracts the subject of a token, and
/// validates a presented token against its persisted record and expiry.

use actix_web::http::header::HeaderMap;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, Header, Validation};

use crate::auth::claims::{Claims, TokenKind};
use crate::auth::secret::SigningSecret;
use crate::auth::validation::TokenValidation;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError, ConfigError};
use crate::persistence::TokenMapper;

const BEARER_PREFIX: &str = "Bearer ";

/// Signs and verifies tokens with one immutable HS256 secret.
///
/// Built once at startup and shared by reference; there is no way to swap
/// the secret afterwards.
#[derive(Debug)]
pub struct TokenProvider {
    secret: SigningSecret,
    header: String,
}

impl TokenProvider {
    /// # Errors
    /// Returns error if the configured secret is empty or unusable
    pub fn new(config: &JwtSettings) -> Result<Self, ConfigError> {
        Ok(Self {
            secret: SigningSecret::from_config(&config.secret)?,
            header: config.header.clone(),
        })
    }

    /// Request header the token is read from
    pub fn header_name(&self) -> &str {
        &self.header
    }

    /// Issue a 30 minute access token
    pub fn issue_access_token(
        &self,
        identity: &str,
        roles: &[String],
    ) -> Result<String, AppError> {
        self.issue_access_token_at(identity, roles, Utc::now())
    }

    pub fn issue_access_token_at(
        &self,
        identity: &str,
        roles: &[String],
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        self.issue(identity, roles, TokenKind::Access, now)
    }

    /// Issue a 14 day refresh token
    pub fn issue_refresh_token(
        &self,
        identity: &str,
        roles: &[String],
    ) -> Result<String, AppError> {
        self.issue_refresh_token_at(identity, roles, Utc::now())
    }

    pub fn issue_refresh_token_at(
        &self,
        identity: &str,
        roles: &[String],
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        self.issue(identity, roles, TokenKind::Refresh, now)
    }

    fn issue(
        &self,
        identity: &str,
        roles: &[String],
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let claims = Claims::new(identity, roles, kind, now);

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            self.secret.encoding_key(),
        )
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    /// Verify the signature and parse the claims. Expiry is left to the
    /// caller so it can be judged against an explicit clock.
    fn decode(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "exp"]);

        decode::<Claims>(token, self.secret.decoding_key(), &validation).map(|data| data.claims)
    }

    /// Subject of a signed, unexpired token
    ///
    /// # Errors
    /// `TokenInvalid` if the token is malformed, unsigned or signed with
    /// another key; `TokenExpired` if it is past its expiration
    pub fn extract_identity(&self, token: &str) -> Result<String, AppError> {
        self.extract_identity_at(token, Utc::now())
    }

    pub fn extract_identity_at(&self, token: &str, now: DateTime<Utc>) -> Result<String, AppError> {
        let claims = self.decode(token).map_err(|e| {
            tracing::warn!("JWT parse error: {}", e);
            AppError::Auth(AuthError::TokenInvalid)
        })?;

        if claims.is_expired_at(now) {
            return Err(AppError::Auth(AuthError::TokenExpired));
        }
        Ok(claims.sub)
    }

    /// Validate a presented token
    ///
    /// The persisted record is checked first; only a token stored verbatim
    /// for some user is parsed at all.
    pub async fn validate(&self, token: &str, mapper: &dyn TokenMapper) -> TokenValidation {
        self.validate_at(token, mapper, Utc::now()).await
    }

    pub async fn validate_at(
        &self,
        token: &str,
        mapper: &dyn TokenMapper,
        now: DateTime<Utc>,
    ) -> TokenValidation {
        match mapper.get_token_record(token).await {
            Ok(Some(record)) if record.access_token == token => {}
            Ok(Some(record)) => {
                tracing::warn!(
                    user_id = %record.user_id,
                    "Presented token differs from stored token"
                );
                return TokenValidation::Invalid;
            }
            Ok(None) => {
                tracing::warn!("Token not found in token store");
                return TokenValidation::Invalid;
            }
            Err(e) => {
                tracing::error!(error = %e, "Token store lookup failed");
                return TokenValidation::Unknown;
            }
        }

        let claims = match self.decode(token) {
            Ok(claims) => claims,
            Err(e) => {
                let outcome = classify(e.kind());
                tracing::warn!(error = %e, outcome = ?outcome, "JWT validation error");
                return outcome;
            }
        };

        if claims.is_expired_at(now) {
            tracing::info!(user_id = %claims.sub, exp = claims.exp, "Token expired");
            return TokenValidation::Expired;
        }

        TokenValidation::Valid(claims)
    }
}

fn classify(kind: &ErrorKind) -> TokenValidation {
    match kind {
        ErrorKind::ExpiredSignature => TokenValidation::Expired,
        ErrorKind::InvalidToken
        | ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidAlgorithmName
        | ErrorKind::MissingAlgorithm
        | ErrorKind::MissingRequiredClaim(_)
        | ErrorKind::ImmatureSignature
        | ErrorKind::InvalidIssuer
        | ErrorKind::InvalidAudience
        | ErrorKind::InvalidSubject
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_) => TokenValidation::Invalid,
        _ => TokenValidation::Unknown,
    }
}

/// Read the token from `header`, tolerating a `Bearer ` prefix
pub fn resolve_token(headers: &HeaderMap, header: &str) -> Option<String> {
    let value = headers.get(header)?.to_str().ok()?.trim_start();
    let token = value.strip_prefix(BEARER_PREFIX).unwrap_or(value).trim();

    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{InMemoryTokenMapper, TokenRecord};
    use async_trait::async_trait;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
    use chrono::Duration;

    fn provider_with(secret: &str) -> TokenProvider {
        TokenProvider::new(&JwtSettings {
            secret: secret.to_string(),
            header: "Authorization".to_string(),
        })
        .expect("Failed to build provider")
    }

    fn provider() -> TokenProvider {
        provider_with("test-secret-key-at-least-32-characters-long")
    }

    fn roles() -> Vec<String> {
        vec!["ROLE_USER".to_string()]
    }

    async fn persisted(token: &str) -> InMemoryTokenMapper {
        let mapper = InMemoryTokenMapper::new();
        mapper
            .save_token_record(&TokenRecord::new("user42", token.to_string(), None))
            .await
            .unwrap();
        mapper
    }

    struct BrokenStore;

    #[async_trait]
    impl TokenMapper for BrokenStore {
        async fn get_token_record(&self, _token: &str) -> Result<Option<TokenRecord>, AppError> {
            Err(sqlx::Error::PoolTimedOut.into())
        }

        async fn save_token_record(&self, _record: &TokenRecord) -> Result<(), AppError> {
            Err(sqlx::Error::PoolTimedOut.into())
        }
    }

    /// Store that answers every lookup with a record holding `stored`
    struct StaleStore {
        stored: String,
    }

    #[async_trait]
    impl TokenMapper for StaleStore {
        async fn get_token_record(&self, _token: &str) -> Result<Option<TokenRecord>, AppError> {
            Ok(Some(TokenRecord::new("user42", self.stored.clone(), None)))
        }

        async fn save_token_record(&self, _record: &TokenRecord) -> Result<(), AppError> {
            Ok(())
        }
    }

    #[test]
    fn test_extract_identity_round_trip() {
        let provider = provider();
        let token = provider.issue_access_token("user42", &roles()).unwrap();

        assert_eq!(token.split('.').count(), 3);
        assert_eq!(provider.extract_identity(&token).unwrap(), "user42");
    }

    #[test]
    fn test_claims_carry_roles_and_lifetimes() {
        let provider = provider();
        let access = provider.issue_access_token("user42", &roles()).unwrap();
        let refresh = provider.issue_refresh_token("user42", &roles()).unwrap();

        let access = provider.decode(&access).unwrap();
        let refresh = provider.decode(&refresh).unwrap();

        assert_eq!(access.roles, roles());
        assert_eq!(access.exp - access.iat, 30 * 60);
        assert_eq!(refresh.exp - refresh.iat, 14 * 24 * 60 * 60);
    }

    #[test]
    fn test_token_from_other_key_is_rejected() {
        let token = provider_with("first-secret")
            .issue_access_token("user42", &roles())
            .unwrap();

        let result = provider_with("second-secret").extract_identity(&token);
        assert!(matches!(result, Err(AppError::Auth(AuthError::TokenInvalid))));
    }

    #[test]
    fn test_tampered_and_malformed_tokens_are_rejected() {
        let provider = provider();
        let token = provider.issue_access_token("user42", &roles()).unwrap();

        for bad in [format!("{}X", token), "invalid.token.here".to_string(), String::new()] {
            let result = provider.extract_identity(&bad);
            assert!(
                matches!(result, Err(AppError::Auth(AuthError::TokenInvalid))),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_unsigned_token_is_rejected() {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#);
        let payload =
            URL_SAFE_NO_PAD.encode(r#"{"sub":"user42","roles":[],"iat":0,"exp":9999999999}"#);
        let unsigned = format!("{}.{}.", header, payload);

        assert!(provider().extract_identity(&unsigned).is_err());
    }

    #[test]
    fn test_extract_identity_rejects_expired_token() {
        let provider = provider();
        let issued = Utc::now() - Duration::hours(1);
        let token = provider
            .issue_access_token_at("user42", &roles(), issued)
            .unwrap();

        assert!(matches!(
            provider.extract_identity(&token),
            Err(AppError::Auth(AuthError::TokenExpired))
        ));
    }

    #[tokio::test]
    async fn test_validate_persisted_fresh_token() {
        let provider = provider();
        let token = provider.issue_access_token("user42", &roles()).unwrap();
        let mapper = persisted(&token).await;

        let outcome = provider.validate(&token, &mapper).await;
        assert!(outcome.is_valid());
        assert_eq!(outcome.claims().unwrap().sub, "user42");
    }

    #[tokio::test]
    async fn test_validate_without_record_is_invalid() {
        let provider = provider();
        let token = provider.issue_access_token("user42", &roles()).unwrap();

        let outcome = provider.validate(&token, &InMemoryTokenMapper::new()).await;
        assert_eq!(outcome, TokenValidation::Invalid);
    }

    #[tokio::test]
    async fn test_validate_with_superseded_record_is_invalid() {
        let provider = provider();
        let token = provider.issue_access_token("user42", &roles()).unwrap();
        let mut mutated = token.clone();
        let last = mutated.pop().unwrap();
        mutated.push(if last == 'A' { 'B' } else { 'A' });
        let mapper = persisted(&mutated).await;

        assert_eq!(provider.validate(&token, &mapper).await, TokenValidation::Invalid);
    }

    #[tokio::test]
    async fn test_validate_record_with_different_token_is_invalid() {
        let provider = provider();
        let token = provider.issue_access_token("user42", &roles()).unwrap();
        let newer = provider
            .issue_access_token_at("user42", &roles(), Utc::now() + Duration::seconds(5))
            .unwrap();
        let store = StaleStore { stored: newer };

        assert_eq!(provider.validate(&token, &store).await, TokenValidation::Invalid);
    }

    #[tokio::test]
    async fn test_validate_expired_token_even_when_persisted() {
        let provider = provider();
        let issued = Utc::now();
        let token = provider
            .issue_access_token_at("user42", &roles(), issued)
            .unwrap();
        let mapper = persisted(&token).await;

        let at_expiry = issued + Duration::minutes(30);
        let later = issued + Duration::minutes(31);

        let outcome = provider.validate_at(&token, &mapper, at_expiry).await;
        assert!(outcome.is_valid());
        assert_eq!(
            provider.validate_at(&token, &mapper, later).await,
            TokenValidation::Expired
        );
    }

    #[tokio::test]
    async fn test_refresh_token_outlives_access_window() {
        let provider = provider();
        let issued = Utc::now();
        let token = provider
            .issue_refresh_token_at("user42", &roles(), issued)
            .unwrap();
        let mapper = persisted(&token).await;

        let later = issued + Duration::days(13);
        let outcome = provider.validate_at(&token, &mapper, later).await;
        assert!(outcome.is_valid());
        let too_late = issued + Duration::days(15);
        assert_eq!(
            provider.validate_at(&token, &mapper, too_late).await,
            TokenValidation::Expired
        );
    }

    #[tokio::test]
    async fn test_validate_persisted_garbage_is_invalid() {
        let mapper = persisted("not-a-jwt").await;
        assert_eq!(
            provider().validate("not-a-jwt", &mapper).await,
            TokenValidation::Invalid
        );
    }

    #[tokio::test]
    async fn test_validate_persisted_token_from_other_key_is_invalid() {
        let token = provider_with("another-secret")
            .issue_access_token("user42", &roles())
            .unwrap();
        let mapper = persisted(&token).await;

        assert_eq!(provider().validate(&token, &mapper).await, TokenValidation::Invalid);
    }

    #[tokio::test]
    async fn test_validate_store_failure_is_unknown() {
        let provider = provider();
        let token = provider.issue_access_token("user42", &roles()).unwrap();

        assert_eq!(
            provider.validate(&token, &BrokenStore).await,
            TokenValidation::Unknown
        );
    }

    #[test]
    fn test_resolve_token_strips_bearer_prefix() {
        let req = actix_web::test::TestRequest::default()
            .insert_header(("Authorization", "Bearer abc.def.ghi"))
            .insert_header(("X-Auth-Token", "raw.token.value"))
            .to_http_request();

        assert_eq!(
            resolve_token(req.headers(), "Authorization").as_deref(),
            Some("abc.def.ghi")
        );
        assert_eq!(
            resolve_token(req.headers(), "X-Auth-Token").as_deref(),
            Some("raw.token.value")
        );
        assert!(resolve_token(req.headers(), "X-Missing").is_none());
    }

    #[test]
    fn test_resolve_token_ignores_empty_value() {
        let req = actix_web::test::TestRequest::default()
            .insert_header(("Authorization", "Bearer "))
            .to_http_request();

        assert!(resolve_token(req.headers(), "Authorization").is_none());
    }
}
