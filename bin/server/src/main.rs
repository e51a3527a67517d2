use comfy_relay_client::JobClient;
use comfy_relay_gateway::Gateway;
use comfy_relay_server::{config::ServerConfig, routes};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!(backend = %config.backend_url(), "Loaded configuration");

    let client =
        JobClient::connect(&config.client_config()).expect("failed to build backend client");
    let gateway = Arc::new(Gateway::new(client, config.gateway_config()));

    if gateway.health().await.backend != "ok" {
        tracing::warn!("backend is not reachable yet; generation requests will fail until it is");
    }

    let app = routes::router(gateway);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
