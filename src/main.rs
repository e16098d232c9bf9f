use std::net::TcpListener;
use user_auth::auth::TokenProvider;
use user_auth::configuration::get_configuration;
use user_auth::persistence::SessionFactory;
use user_auth::startup::run;
use user_auth::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // 설정 로드 (로그 레벨이 설정에 있으므로 먼저 읽는다)
    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "Configuration error")
    })?;

    // 구조화된 로깅 초기화
    init_telemetry(&configuration.application.log_level);
    tracing::info!("Configuration loaded successfully");

    // 서명 키는 여기서 한 번만 만든다
    let provider = TokenProvider::new(&configuration.jwt).map_err(|e| {
        tracing::error!("Invalid JWT configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "JWT configuration error")
    })?;

    // 데이터베이스 연결 + 매퍼 등록
    tracing::info!(locations = %configuration.mapper.locations, "Building session factory");
    let session = SessionFactory::connect(&configuration.database, &configuration.mapper)
        .await
        .map_err(|e| {
            tracing::error!("Failed to build session factory: {}", e);
            std::io::Error::new(std::io::ErrorKind::Other, "Session factory error")
        })?;

    let address = format!("127.0.0.1:{}", configuration.application.port);
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let server = run(listener, session, provider)?;
    server.await
}
