//! Book/tag link queries

use super::BaseRepository;
use crate::db::models::*;
use crate::errors::Result;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

impl BaseRepository<BookTagEntity> {
    pub async fn find_by_book(&self, book_id: &str) -> Result<Vec<BookTag>> {
        BookTagEntity::find()
            .filter(BookTagColumn::BookId.eq(book_id))
            .all(self.ctx().conn())
            .await
            .map_err(Into::into)
    }

    pub async fn find_by_tag(&self, tag_id: &str) -> Result<Vec<BookTag>> {
        BookTagEntity::find()
            .filter(BookTagColumn::TagId.eq(tag_id))
            .all(self.ctx().conn())
            .await
            .map_err(Into::into)
    }
}
