use crate::config::AppConfig;
use metrics::counter;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::info;

/// Type alias for the shared database handle.
pub type DbPool = DatabaseConnection;

/// Establishes the database connection pool from application config.
pub async fn establish_connection(cfg: &AppConfig) -> Result<DbPool, DbErr> {
    // A pooled sqlite::memory: would hand each connection its own empty
    // database; pin the pool to one connection in that case.
    let max_connections = if cfg.database_url.contains(":memory:") {
        1
    } else {
        10
    };
    let mut opts = ConnectOptions::new(cfg.database_url.clone());
    opts.max_connections(max_connections)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(600))
        .sqlx_logging(cfg.environment == "development");

    let db = Database::connect(opts).await?;
    counter!("stockledger_db_connections_established", 1);
    info!("Database connection established");
    Ok(db)
}

/// Runs all pending migrations.
pub async fn run_migrations(db: &DbPool) -> Result<(), DbErr> {
    crate::migrator::Migrator::up(db, None).await?;
    info!("Database migrations applied");
    Ok(())
}
