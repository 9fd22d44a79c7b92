//! Book entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "books")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub title: String,

    pub author: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    /// Key of the cover image in blob storage; absent until a cover is uploaded
    #[sea_orm(nullable)]
    pub cover_key: Option<String>,

    #[sea_orm(nullable)]
    pub publisher: Option<String>,

    #[sea_orm(nullable)]
    pub page_count: Option<i32>,

    /// Owning user
    pub user_id: String,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Owner,

    #[sea_orm(has_many = "super::comment::Entity")]
    Comments,

    #[sea_orm(has_many = "super::book_genre::Entity")]
    BookGenres,

    #[sea_orm(has_many = "super::book_tag::Entity")]
    BookTags,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl Related<super::book_genre::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BookGenres.def()
    }
}

impl Related<super::book_tag::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BookTags.def()
    }
}

impl Related<super::genre::Entity> for Entity {
    fn to() -> RelationDef {
        super::book_genre::Relation::Genre.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::book_genre::Relation::Book.def().rev())
    }
}

impl Related<super::tag::Entity> for Entity {
    fn to() -> RelationDef {
        super::book_tag::Relation::Tag.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::book_tag::Relation::Book.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
