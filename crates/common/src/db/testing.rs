//! Fixtures for tests that need a live store

use crate::db::models::*;
use crate::db::{schema, DbContext, DbPool};
use chrono::{TimeZone, Utc};
use sea_orm::{ConnectOptions, Database};

/// Fresh in-memory SQLite pool with the catalogue schema
pub(crate) async fn memory_pool() -> DbPool {
    // One connection only: every new SQLite memory connection is a new database.
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1).min_connections(1).sqlx_logging(false);

    let conn = Database::connect(opts).await.expect("sqlite memory database");
    schema::create_tables(&conn).await.expect("schema");
    DbPool::from_connection(conn)
}

/// Request scope over a fresh in-memory store
pub(crate) async fn scope() -> DbContext {
    memory_pool().await.begin_scope()
}

pub(crate) fn sample_user(id: &str) -> ApplicationUser {
    ApplicationUser {
        id: id.to_string(),
        user_name: format!("{id}-name"),
        email: format!("{id}@bookspace.test"),
        display_name: None,
        created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
    }
}

pub(crate) fn sample_book(id: &str, title: &str, owner: &str) -> Book {
    Book {
        id: id.to_string(),
        title: title.to_string(),
        author: "Frank Herbert".to_string(),
        description: Some("Desert planet politics".to_string()),
        cover_key: None,
        publisher: None,
        page_count: Some(412),
        user_id: owner.to_string(),
        created_at: Utc.with_ymd_and_hms(2024, 3, 2, 8, 30, 0).unwrap(),
    }
}
