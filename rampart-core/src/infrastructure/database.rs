//! SQLite connection bootstrap

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::info;

use crate::config::DatabaseConfig;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Database bootstrap errors
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Invalid database url: {0}")]
    InvalidUrl(String),

    #[error("Failed to connect: {0}")]
    Connect(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Shared SQLite pool
#[derive(Debug, Clone)]
pub struct Database {
    pool: Arc<SqlitePool>,
}

impl Database {
    /// Open a pool for `config.url`, creating the file if missing.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let in_memory = config.url.contains(":memory:");

        let mut options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| DatabaseError::InvalidUrl(e.to_string()))?
            .create_if_missing(true)
            .foreign_keys(true);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // Each in-memory connection is its own database
        let max_connections = if in_memory { 1 } else { config.max_connections };

        info!(url = %config.url, max_connections, "Opening SQLite pool");
        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds));
        if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }
        let pool = pool_options.connect_with(options).await?;

        let database = Self {
            pool: Arc::new(pool),
        };

        if config.run_migrations {
            database.migrate().await?;
        }

        Ok(database)
    }

    /// Apply embedded migrations.
    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        MIGRATOR.run(&*self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> Arc<SqlitePool> {
        self.pool.clone()
    }
}
