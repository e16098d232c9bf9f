/// JWT Authentication Middleware
///
/// Resolves the token from the configured header, validates it against the
/// token store, reloads the account it names, and records the outcome in the
/// request extensions: `AuthenticatedUser` on success, `AuthFailure` when the
/// token itself was rejected.

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage, ResponseError,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use std::sync::Arc;

use crate::auth::{resolve_token, AuthFailure, TokenProvider, TokenValidation};
use crate::error::{AppError, AuthError};
use crate::persistence::{TokenMapper, UserCredentials, UserMapper};

/// Identity of the caller, available to handlers as `web::ReqData`
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct AuthenticatedUser {
    pub identity: String,
    pub roles: Vec<String>,
}

impl From<UserCredentials> for AuthenticatedUser {
    fn from(user: UserCredentials) -> Self {
        Self {
            identity: user.user_id,
            roles: user.roles,
        }
    }
}

/// Reload the account named by a valid token. Roles come from the store.
async fn load_user(users: &dyn UserMapper, user_id: &str) -> Result<AuthenticatedUser, AuthError> {
    match users.find_credentials(user_id).await {
        Ok(Some(user)) if user.is_active => Ok(user.into()),
        Ok(Some(_)) => {
            tracing::warn!(user_id = %user_id, "Token belongs to an inactive account");
            Err(AuthError::AccountInactive)
        }
        Ok(None) => {
            tracing::warn!(user_id = %user_id, "Token subject no longer exists");
            Err(AuthFailure::Invalid.into())
        }
        Err(e) => {
            tracing::error!(error = %e, user_id = %user_id, "User lookup failed");
            Err(AuthFailure::Unknown.into())
        }
    }
}

/// JWT middleware for protecting routes
pub struct JwtMiddleware {
    provider: Arc<TokenProvider>,
    tokens: Arc<dyn TokenMapper>,
    users: Arc<dyn UserMapper>,
}

impl JwtMiddleware {
    pub fn new(
        provider: Arc<TokenProvider>,
        tokens: Arc<dyn TokenMapper>,
        users: Arc<dyn UserMapper>,
    ) -> Self {
        Self {
            provider,
            tokens,
            users,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtMiddlewareService {
            service: Rc::new(service),
            provider: self.provider.clone(),
            tokens: self.tokens.clone(),
            users: self.users.clone(),
        }))
    }
}

pub struct JwtMiddlewareService<S> {
    service: Rc<S>,
    provider: Arc<TokenProvider>,
    tokens: Arc<dyn TokenMapper>,
    users: Arc<dyn UserMapper>,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let provider = self.provider.clone();
        let tokens = self.tokens.clone();
        let users = self.users.clone();

        Box::pin(async move {
            let token = match resolve_token(req.headers(), provider.header_name()) {
                Some(token) => token,
                None => {
                    tracing::warn!(header = provider.header_name(), "Missing authentication token");
                    let response = AppError::Auth(AuthError::MissingToken).error_response();
                    return Ok(req.into_response(response).map_into_right_body());
                }
            };

            let outcome = match provider.validate(&token, tokens.as_ref()).await {
                TokenValidation::Valid(claims) => load_user(users.as_ref(), &claims.sub).await,
                rejected => Err(rejected.failure().unwrap_or(AuthFailure::Unknown).into()),
            };

            match outcome {
                Ok(user) => {
                    tracing::debug!(user_id = %user.identity, "JWT validated successfully");
                    req.extensions_mut().insert(user);

                    service
                        .call(req)
                        .await
                        .map(ServiceResponse::map_into_left_body)
                }
                Err(error) => {
                    if let Some(failure) = AuthFailure::from_error(&error) {
                        req.extensions_mut().insert(failure);
                    }

                    let response = AppError::Auth(error).error_response();
                    Ok(req.into_response(response).map_into_right_body())
                }
            }
        })
    }
}
