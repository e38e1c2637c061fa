//! Database module: PostgreSQL connection pooling and the game repository.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

pub mod config;
pub mod repository;

pub use config::DatabaseConfig;
pub use repository::{
    GameRepository, InMemoryGameRepository, PgGameRepository, RepositoryError, RepositoryResult,
};

/// Database connection pool wrapper
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use private_blackjack::db::{Database, DatabaseConfig};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), sqlx::Error> {
    ///     let config = DatabaseConfig::from_env();
    ///     let db = Database::new(&config).await?;
    ///     db.health_check().await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .connect(&config.database_url)
            .await?;

        log::info!("Connected to database (max {} connections)", config.max_connections);
        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check if the database connection is healthy
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the database connection pool
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
    async fn test_database_connection() {
        let config = DatabaseConfig {
            max_connections: 5,
            connection_timeout_secs: 5,
            ..DatabaseConfig::from_env()
        };

        let db = Database::new(&config)
            .await
            .expect("Failed to connect to database");
        db.health_check().await.expect("Health check failed");
        db.close().await;
    }
}
