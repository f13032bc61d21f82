use anyhow::Context;
use chrono::Utc;
use tokio::net::TcpListener;

use eafoods_infra::seed::seed_demo_catalog;
use eafoods_infra::{AppConfig, InMemoryStore, PostgresStore, Services, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    eafoods_observability::init(config.log_format);

    if config.jwt_secret_is_default {
        tracing::warn!("JWT_SECRET not set; using insecure dev default");
    }

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    match config.database_url.as_deref() {
        Some(url) => {
            let store = PostgresStore::connect(url)
                .await
                .context("failed to connect to postgres")?;
            store.ensure_schema().await?;
            tracing::info!("using postgres store");
            serve(store, &config, listener).await
        }
        None => {
            tracing::info!("DATABASE_URL not set; using in-memory store");
            serve(InMemoryStore::new(), &config, listener).await
        }
    }
}

async fn serve<S: Store + Clone>(
    store: S,
    config: &AppConfig,
    listener: TcpListener,
) -> anyhow::Result<()> {
    let services = Services::from_config(store, config);
    if config.seed_demo_data {
        seed_demo_catalog(&services.ledger, Utc::now()).await?;
    }

    let app = eafoods_api::app::build_app(services, &config.jwt_secret);
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
