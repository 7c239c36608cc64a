use anyhow::Result;
use codeweb_mongodb::{Connection, Store};
use codeweb_server::{auth::TokenIssuer, router, AppState, Config};
use tokio::net::TcpListener;
use tracing::{info, warn};

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init()
        .ok();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let config = Config::from_env()?;
    info!(?config, "configuration loaded");

    let connection = Connection::with_config(&config.mongodb_url, config.pool.clone()).await?;
    let state = AppState::new(
        Store::new(connection.clone()),
        TokenIssuer::new(config.token_secret.clone()),
    );

    let address = config.bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!(%address, "codeweb server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    connection.close().await;
    Ok(())
}
