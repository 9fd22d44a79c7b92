//! Database layer for BookSpace
//!
//! Provides:
//! - SeaORM entity models
//! - Generic repository with per-entity read queries
//! - Request-scoped unit of work
//! - Connection pool management

mod context;
pub mod models;
mod repository;
pub mod schema;

#[cfg(test)]
pub(crate) mod testing;

pub use context::DbContext;
pub use repository::{BaseRepository, BookGraph, Id, Repository};

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Fresh primary key for a new row
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    conn: DatabaseConnection,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to database...");

        let mut opts = ConnectOptions::new(&config.url);
        opts.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .sqlx_logging(true);

        let conn = Database::connect(opts)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect: {}", e),
            })?;

        info!("Database connection established");

        Ok(Self { conn })
    }

    /// Wrap an already established connection
    pub fn from_connection(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Open a request scope: one unit of work, committed by `save_changes`
    pub fn begin_scope(&self) -> DbContext {
        DbContext::new(self.conn.clone())
    }

    /// Raw connection, for schema bootstrap and health checks
    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.conn
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Ping failed: {}", e),
            })?;

        Ok(())
    }
}
