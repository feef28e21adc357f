//! Process startup shared by the server and job binaries

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use infra_db::{create_pool, run_migrations, DatabaseConfig, DatabasePool};

use crate::config::ApiConfig;

/// Loads `.env` if present, then the `API_` environment
pub fn load_config() -> anyhow::Result<ApiConfig> {
    dotenvy::dotenv().ok();
    ApiConfig::from_env().context("failed to load API configuration")
}

/// Installs the global subscriber
///
/// `RUST_LOG` wins over the configured level.
pub fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Connects as `application_name` and applies pending migrations
pub async fn connect_database(config: &ApiConfig, application_name: &str) -> anyhow::Result<DatabasePool> {
    tracing::info!(application_name, "connecting to database");
    let pool = create_pool(
        DatabaseConfig::new(&config.database_url)
            .application_name(application_name)
            .max_connections(config.database_max_connections),
    )
    .await
        .context("failed to connect to database")?;
    run_migrations(&pool).await.context("failed to apply migrations")?;
    Ok(pool)
}
