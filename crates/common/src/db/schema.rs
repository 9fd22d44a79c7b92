//! Schema bootstrap from the entity definitions
//!
//! Creates any missing table in foreign-key order. Intended for local runs
//! and tests; production schemas are managed outside this crate.

use crate::db::models::*;
use crate::errors::Result;
use sea_orm::{ConnectionTrait, DatabaseConnection, EntityTrait, Schema};
use tracing::info;

/// Create every catalogue table that does not exist yet
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    create::<UserEntity>(db, UserEntity).await?;
    create::<BookEntity>(db, BookEntity).await?;
    create::<GenreEntity>(db, GenreEntity).await?;
    create::<TagEntity>(db, TagEntity).await?;
    create::<BookGenreEntity>(db, BookGenreEntity).await?;
    create::<BookTagEntity>(db, BookTagEntity).await?;
    create::<CommentEntity>(db, CommentEntity).await?;

    info!("Catalogue schema ready");
    Ok(())
}

async fn create<E: EntityTrait>(db: &DatabaseConnection, entity: E) -> Result<()> {
    let backend = db.get_database_backend();
    let mut stmt = Schema::new(backend).create_table_from_entity(entity);
    stmt.if_not_exists();
    db.execute(backend.build(&stmt)).await?;
    Ok(())
}
