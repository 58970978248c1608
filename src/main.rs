//! Marketplace Commerce - multi-store marketplace API server

use anyhow::{Context, Result};
use marketplace_commerce::events::EventPublisher;
use marketplace_commerce::{build_router, db, AppState, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("invalid configuration")?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let pool = db::create_pool(&config).await.context("failed to connect to database")?;
    if config.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await.context("failed to run migrations")?;
        tracing::info!("migrations applied");
    }
    let events = EventPublisher::connect(config.nats_url.as_deref()).await;

    let addr = config.socket_addr();
    let app = build_router(AppState::new(pool, config, events));

    tracing::info!("marketplace-commerce listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
