//! Genre queries

use super::BaseRepository;
use crate::db::models::*;
use crate::errors::Result;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};

impl BaseRepository<GenreEntity> {
    /// Look a genre up by its unique name
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Genre>> {
        GenreEntity::find()
            .filter(GenreColumn::Name.eq(name))
            .one(self.ctx().conn())
            .await
            .map_err(Into::into)
    }

    /// Genres of one book, ordered by name
    pub async fn find_by_book(&self, book_id: &str) -> Result<Vec<Genre>> {
        GenreEntity::find()
            .inner_join(BookGenreEntity)
            .filter(BookGenreColumn::BookId.eq(book_id))
            .order_by_asc(GenreColumn::Name)
            .all(self.ctx().conn())
            .await
            .map_err(Into::into)
    }

    /// Every genre, ordered by name
    pub async fn list(&self) -> Result<Vec<Genre>> {
        GenreEntity::find()
            .order_by_asc(GenreColumn::Name)
            .all(self.ctx().conn())
            .await
            .map_err(Into::into)
    }
}
