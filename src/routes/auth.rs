/// Authentication Routes
///
/// Login (credentials in, token pair out) and the current-user endpoint
/// behind the JWT middleware.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{verify_password, TokenProvider, ACCESS_TOKEN_TTL_MINUTES};
use crate::error::{AppError, AuthError, ErrorContext};
use crate::middleware::AuthenticatedUser;
use crate::persistence::{TokenMapper, TokenRecord, UserMapper};
use crate::validators::{is_valid_password, is_valid_user_id};

/// User login request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub user_id: String,
    pub password: String,
}

/// Token pair returned on login
#[derive(Serialize, Deserialize, Debug)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// POST /auth/login
///
/// Verifies the user's password, issues an access and a refresh token, and
/// stores them as the user's current token record. Any earlier access
/// token of the same user stops validating.
///
/// # Errors
/// - 400: Malformed user id or password
/// - 401: Unknown user or wrong password (same response for both)
/// - 403: Account is inactive
/// - 500: Store or signing failure
pub async fn login(
    form: web::Json<LoginRequest>,
    users: web::Data<dyn UserMapper>,
    provider: web::Data<TokenProvider>,
    tokens: web::Data<dyn TokenMapper>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("login");

    let result = authenticate(&form, users.get_ref(), provider.get_ref(), tokens.get_ref()).await;
    match result {
        Ok(response) => {
            tracing::info!(request_id = %context.request_id, "User logged in successfully");
            Ok(HttpResponse::Ok().json(response))
        }
        Err(e) => {
            context.with_user_id(form.user_id.trim().to_string()).log_error(&e);
            Err(e)
        }
    }
}

async fn authenticate(
    form: &LoginRequest,
    users: &dyn UserMapper,
    provider: &TokenProvider,
    tokens: &dyn TokenMapper,
) -> Result<AuthResponse, AppError> {
    let user_id = is_valid_user_id(&form.user_id)?;
    is_valid_password(&form.password)?;

    let user = users
        .find_credentials(&user_id)
        .await?
        .ok_or(AppError::Auth(AuthError::InvalidCredentials))?;

    if !verify_password(&form.password, &user.password_hash)? {
        return Err(AppError::Auth(AuthError::InvalidCredentials));
    }
    if !user.is_active {
        return Err(AppError::Auth(AuthError::AccountInactive));
    }

    let access_token = provider.issue_access_token(&user.user_id, &user.roles)?;
    let refresh_token = provider.issue_refresh_token(&user.user_id, &user.roles)?;

    tokens
        .save_token_record(&TokenRecord::new(
            &user.user_id,
            access_token.clone(),
            Some(refresh_token.clone()),
        ))
        .await?;

    Ok(AuthResponse {
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: ACCESS_TOKEN_TTL_MINUTES * 60,
    })
}

/// GET /api/me
///
/// Identity and roles of the caller, as reloaded by the JWT middleware.
pub async fn current_user(user: web::ReqData<AuthenticatedUser>) -> HttpResponse {
    HttpResponse::Ok().json(user.into_inner())
}
