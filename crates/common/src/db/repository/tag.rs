//! Tag queries

use super::BaseRepository;
use crate::db::models::*;
use crate::errors::Result;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};

impl BaseRepository<TagEntity> {
    /// Look a tag up by its unique name
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Tag>> {
        TagEntity::find()
            .filter(TagColumn::Name.eq(name))
            .one(self.ctx().conn())
            .await
            .map_err(Into::into)
    }

    /// Tags of one book, ordered by name
    pub async fn find_by_book(&self, book_id: &str) -> Result<Vec<Tag>> {
        TagEntity::find()
            .inner_join(BookTagEntity)
            .filter(BookTagColumn::BookId.eq(book_id))
            .order_by_asc(TagColumn::Name)
            .all(self.ctx().conn())
            .await
            .map_err(Into::into)
    }

    /// Every tag, ordered by name
    pub async fn list(&self) -> Result<Vec<Tag>> {
        TagEntity::find()
            .order_by_asc(TagColumn::Name)
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
    async fn test_tag_lookups() {
        let ctx = scope().await;
        ctx.users().add(sample_user("u1")).await.unwrap();
        ctx.books().add(sample_book("b1", "Dune", "u1")).await.unwrap();
        ctx.books().add(sample_book("b2", "Emma", "u1")).await.unwrap();
        for (id, name) in [("t1", "space"), ("t2", "classic"), ("t3", "desert")] {
            ctx.tags()
                .add(Tag { id: id.into(), name: name.into() })
                .await
                .unwrap();
        }
        for tag_id in ["t1", "t3"] {
            ctx.book_tags()
                .add(BookTag { book_id: "b1".into(), tag_id: tag_id.into() })
                .await
                .unwrap();
        }
        ctx.save_changes().await.unwrap();

        // Staged but never saved; reads must neither see nor flush it.
        ctx.tags()
            .add(Tag { id: "t4".into(), name: "arrakis".into() })
            .await
            .unwrap();

        let tags = ctx.tags();
        assert_eq!(tags.find_by_name("classic").await.unwrap().unwrap().id, "t2");
        assert!(tags.find_by_name("arrakis").await.unwrap().is_none());

        let of_book: Vec<_> = tags
            .find_by_book("b1")
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(of_book, vec!["desert", "space"]);
        assert!(tags.find_by_book("b2").await.unwrap().is_empty());

        let names: Vec<_> = tags.list().await.unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["classic", "desert", "space"]);

        assert_eq!(ctx.pending().await, 1);
    }
}
