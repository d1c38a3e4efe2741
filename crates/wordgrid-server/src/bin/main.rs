use tracing_subscriber::EnvFilter;
use wordgrid_server::config::AppConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env();
    let app = wordgrid_server::build_app(&config).await;

    let addr = format!("0.0.0.0:{}", config.bind_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");

    tracing::info!(%addr, "wordgrid-server listening");
    axum::serve(listener, app).await.expect("server error");
}
