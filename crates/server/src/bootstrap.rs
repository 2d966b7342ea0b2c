use std::sync::Arc;

use payflow_core::capabilities::RoleCapabilityResolver;
use payflow_core::config::{AppConfig, ConfigError};
use payflow_core::service::ApprovalService;
use payflow_db::{connect_with_config, migrations, DbPool, SqlApprovalRequestRepository};
use thiserror::Error;
use tracing::info;

pub type AppService = ApprovalService<SqlApprovalRequestRepository, RoleCapabilityResolver>;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub service: AppService,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let resolver = config.capabilities.resolver()?;

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let service = ApprovalService::new(
        Arc::new(SqlApprovalRequestRepository::new(db_pool.clone())),
        Arc::new(resolver),
    )
    .with_limits(config.listing.limits());

    Ok(Application { config, db_pool, service })
}
