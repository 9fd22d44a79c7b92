//! Book/genre link queries

use super::BaseRepository;
use crate::db::models::*;
use crate::errors::Result;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

impl BaseRepository<BookGenreEntity> {
    pub async fn find_by_book(&self, book_id: &str) -> Result<Vec<BookGenre>> {
        BookGenreEntity::find()
            .filter(BookGenreColumn::BookId.eq(book_id))
            .all(self.ctx().conn())
            .await
            .map_err(Into::into)
    }

    pub async fn find_by_genre(&self, genre_id: &str) -> Result<Vec<BookGenre>> {
        BookGenreEntity::find()
            .filter(BookGenreColumn::GenreId.eq(genre_id))
            .all(self.ctx().conn())
            .await
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::models::*;
    use crate::db::testing::{sample_book, sample_user, scope};
    use crate::db::Repository;

    #[tokio::test]
    async fn test_link_lookups() {
        let ctx = scope().await;
        ctx.users().add(sample_user("u1")).await.unwrap();
        ctx.books().add(sample_book("b1", "Dune", "u1")).await.unwrap();
        ctx.books().add(sample_book("b2", "Hyperion", "u1")).await.unwrap();
        ctx.genres()
            .add(Genre { id: "g1".into(), name: "Science Fiction".into() })
            .await
            .unwrap();
        ctx.genres()
            .add(Genre { id: "g2".into(), name: "Adventure".into() })
            .await
            .unwrap();
        for (book_id, genre_id) in [("b1", "g1"), ("b1", "g2"), ("b2", "g1")] {
            ctx.book_genres()
                .add(BookGenre { book_id: book_id.into(), genre_id: genre_id.into() })
                .await
                .unwrap();
        }
        ctx.save_changes().await.unwrap();

        ctx.book_genres()
            .delete(("b2".to_string(), "g1".to_string()))
            .await
            .unwrap();

        let links = ctx.book_genres();
        let mut of_book: Vec<_> = links
            .find_by_book("b1")
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.genre_id)
            .collect();
        of_book.sort();
        assert_eq!(of_book, vec!["g1", "g2"]);

        // The staged delete has not been applied.
        let mut sci_fi: Vec<_> = links
            .find_by_genre("g1")
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.book_id)
            .collect();
        sci_fi.sort();
        assert_eq!(sci_fi, vec!["b1", "b2"]);
        assert!(links.find_by_genre("g9").await.unwrap().is_empty());
        assert_eq!(ctx.pending().await, 1);
    }
}
