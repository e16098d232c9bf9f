mod auth;
mod health_check;

pub use auth::current_user;
pub use auth::login;
pub use auth::AuthResponse;
pub use auth::LoginRequest;
pub use health_check::health_check;
