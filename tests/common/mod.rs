#![allow(dead_code)]

use std::net::TcpListener;
use std::sync::Arc;
use user_auth::auth::{hash_password_with_cost, TokenProvider};
use user_auth::configuration::JwtSettings;
use user_auth::persistence::{
    InMemoryTokenMapper, InMemoryUserMapper, TokenMapper, UserCredentials, UserMapper,
};
use user_auth::startup::run_with_stores;

pub const TEST_SECRET: &str = "integration-test-secret-key-of-decent-length";

pub struct TestApp {
    pub address: String,
    pub tokens: Arc<InMemoryTokenMapper>,
    pub users: Arc<InMemoryUserMapper>,
    /// Same secret as the server, for minting tokens in tests
    pub provider: TokenProvider,
}

impl TestApp {
    /// Register an account with the `ROLE_USER` role
    pub fn add_user(&self, user_id: &str, password: &str, is_active: bool) {
        self.users
            .insert(UserCredentials {
                user_id: user_id.to_string(),
                password_hash: hash_password_with_cost(password, 4).expect("Failed to hash"),
                roles: vec!["ROLE_USER".to_string()],
                is_active,
            })
            .expect("Failed to add user");
    }
}

pub fn jwt_settings(header: &str) -> JwtSettings {
    JwtSettings {
        secret: TEST_SECRET.to_string(),
        header: header.to_string(),
    }
}

pub fn mapper_locations() -> String {
    format!("{}/mappers/*.sql", env!("CARGO_MANIFEST_DIR"))
}

/// Server with in-memory token and user stores
pub async fn spawn_app_with_header(header: &str) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let tokens = Arc::new(InMemoryTokenMapper::new());
    let users = Arc::new(InMemoryUserMapper::new());
    let server_tokens: Arc<dyn TokenMapper> = tokens.clone();
    let server_users: Arc<dyn UserMapper> = users.clone();
    let server_provider = TokenProvider::new(&jwt_settings(header)).expect("Bad JWT settings");

    let server = run_with_stores(listener, server_provider, server_tokens, server_users)
        .expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        tokens,
        users,
        provider: TokenProvider::new(&jwt_settings(header)).expect("Bad JWT settings"),
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with_header("Authorization").await
}
