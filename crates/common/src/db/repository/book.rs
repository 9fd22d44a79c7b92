//! Book queries

use super::{BaseRepository, Repository};
use crate::db::models::*;
use crate::errors::Result;
use sea_orm::{ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder};

/// A book together with its genres and tags
#[derive(Debug, Clone, PartialEq)]
pub struct BookGraph {
    pub book: Book,
    pub genres: Vec<Genre>,
    pub tags: Vec<Tag>,
}

impl BaseRepository<BookEntity> {
    /// Load a book with its genres and tags (both ordered by name).
    /// Fails with `NotFound` when the book does not exist.
    pub async fn find_graph(&self, id: &str) -> Result<BookGraph> {
        let book = self.get_by_id(id.to_string()).await?;
        let conn = self.ctx().conn();

        let genres = book
            .find_related(GenreEntity)
            .order_by_asc(GenreColumn::Name)
            .all(conn)
            .await?;

        let tags = book
            .find_related(TagEntity)
            .order_by_asc(TagColumn::Name)
            .all(conn)
            .await?;

        Ok(BookGraph { book, genres, tags })
    }

    /// All books carrying the given tag
    pub async fn find_by_tag(&self, tag_id: &str) -> Result<Vec<Book>> {
        BookEntity::find()
            .inner_join(BookTagEntity)
            .filter(BookTagColumn::TagId.eq(tag_id))
            .order_by_asc(BookColumn::Title)
            .all(self.ctx().conn())
            .await
            .map_err(Into::into)
    }

    /// All books classified under the given genre
    pub async fn find_by_genre(&self, genre_id: &str) -> Result<Vec<Book>> {
        BookEntity::find()
            .inner_join(BookGenreEntity)
            .filter(BookGenreColumn::GenreId.eq(genre_id))
            .order_by_asc(BookColumn::Title)
            .all(self.ctx().conn())
            .await
            .map_err(Into::into)
    }

    /// Books owned by a user
    pub async fn find_by_owner(&self, user_id: &str) -> Result<Vec<Book>> {
        BookEntity::find()
            .filter(BookColumn::UserId.eq(user_id))
            .order_by_asc(BookColumn::Title)
            .all(self.ctx().conn())
            .await
            .map_err(Into::into)
    }

    /// Whether any book other than `except_id` still points at a cover key
    pub async fn cover_in_use(&self, key: &str, except_id: &str) -> Result<bool> {
        let holders = BookEntity::find()
            .filter(BookColumn::CoverKey.eq(key))
            .filter(BookColumn::Id.ne(except_id))
            .count(self.ctx().conn())
            .await?;
        Ok(holders > 0)
    }

    /// Every book, ordered by title
    pub async fn list(&self) -> Result<Vec<Book>> {
        BookEntity::find()
            .order_by_asc(BookColumn::Title)
            .all(self.ctx().conn())
            .await
            .map_err(Into::into)
    }
}
