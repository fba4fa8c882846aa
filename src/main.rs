use devhub::config::GatewayConfig;
use devhub::routes;
use devhub::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()
        .expect("invalid PORT");

    let config = GatewayConfig::from_env().expect("gateway config");
    tracing::info!(gateway = %config.base, "using API gateway");

    let state = AppState::new(config).expect("http client init failed");

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "devhub listening");
    axum::serve(listener, app).await.expect("server failed");
}
