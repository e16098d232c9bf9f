/// Persistence module
///
/// Session factory wiring (pool + mapped SQL statements) and the mappers
/// built on top of it.

mod session;
mod token_mapper;
mod user_mapper;

pub use session::resolve_mapper_locations;
pub use session::MapperRegistry;
pub use session::SessionFactory;
pub use token_mapper::InMemoryTokenMapper;
pub use token_mapper::PgTokenMapper;
pub use token_mapper::TokenMapper;
pub use token_mapper::TokenRecord;
pub use user_mapper::InMemoryUserMapper;
pub use user_mapper::PgUserMapper;
pub use user_mapper::UserCredentials;
pub use user_mapper::UserMapper;
