/// Middleware module
///
/// Custom middleware for authentication and request logging.

mod jwt_middleware;

pub use jwt_middleware::AuthenticatedUser;
pub use jwt_middleware::JwtMiddleware;
