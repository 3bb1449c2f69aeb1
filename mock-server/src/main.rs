use mock_server::Settings;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let defaults = Settings::default();
    let settings = Settings {
        relative_path: std::env::var("RELATIVE_PATH").unwrap_or(defaults.relative_path),
        csrf_token: std::env::var("CSRF_TOKEN").unwrap_or(defaults.csrf_token),
    };

    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, relative_path = %settings.relative_path, "listening");
    mock_server::run(listener, settings).await
}
