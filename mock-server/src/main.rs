use mock_server::AppState;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "5000".to_string());
    let token = std::env::var("MOCK_API_TOKEN").unwrap_or_else(|_| {
        info!("MOCK_API_TOKEN not set, using default: dev-token");
        "dev-token".to_string()
    });

    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!("listening on {addr}");
    mock_server::run(listener, AppState::new(&token)).await
}
