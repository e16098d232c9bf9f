use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::TokenProvider;
use crate::logger::LoggerMiddleware;
use crate::middleware::JwtMiddleware;
use crate::persistence::{PgTokenMapper, PgUserMapper, SessionFactory, TokenMapper, UserMapper};
use crate::routes::{current_user, health_check, login};

/// Serve with token records and user accounts kept in PostgreSQL
pub fn run(
    listener: TcpListener,
    session: SessionFactory,
    provider: TokenProvider,
) -> Result<Server, std::io::Error> {
    let tokens: Arc<dyn TokenMapper> = Arc::new(PgTokenMapper::new(session.clone()));
    let users: Arc<dyn UserMapper> = Arc::new(PgUserMapper::new(session));
    run_with_stores(listener, provider, tokens, users)
}

pub fn run_with_stores(
    listener: TcpListener,
    provider: TokenProvider,
    tokens: Arc<dyn TokenMapper>,
    users: Arc<dyn UserMapper>,
) -> Result<Server, std::io::Error> {
    let provider = Arc::new(provider);
    let provider_data = web::Data::from(provider.clone());
    let tokens_data: web::Data<dyn TokenMapper> = web::Data::from(tokens.clone());
    let users_data: web::Data<dyn UserMapper> = web::Data::from(users.clone());
    let token_header = provider.header_name().to_string();

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(Logger::default())
            .wrap(LoggerMiddleware::new(&token_header))

            // Shared state
            .app_data(provider_data.clone())
            .app_data(tokens_data.clone())
            .app_data(users_data.clone())

            // Public routes
            .route("/health_check", web::get().to(health_check))
            .route("/auth/login", web::post().to(login))

            // Protected routes (require a valid, persisted access token of an active user)
            .service(
                web::scope("/api")
                    .wrap(JwtMiddleware::new(
                        provider.clone(),
                        tokens.clone(),
                        users.clone(),
                    ))
                    .route("/me", web::get().to(current_user)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
