//! Comment queries

use super::BaseRepository;
use crate::db::models::*;
use crate::errors::Result;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};

impl BaseRepository<CommentEntity> {
    /// Comments on a book, oldest first
    pub async fn find_by_book(&self, book_id: &str) -> Result<Vec<Comment>> {
        CommentEntity::find()
            .filter(CommentColumn::BookId.eq(book_id))
            .order_by_asc(CommentColumn::Date)
            .all(self.ctx().conn())
            .await
            .map_err(Into::into)
    }

    /// Comments written by a user, newest first
    pub async fn find_by_user(&self, user_id: &str) -> Result<Vec<Comment>> {
        CommentEntity::find()
            .filter(CommentColumn::UserId.eq(user_id))
            .order_by_desc(CommentColumn::Date)
            .all(self.ctx().conn())
            .await
            .map_err(Into::into)
    }
}
