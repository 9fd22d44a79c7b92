//! SeaORM entity models
//!
//! Database entities for the BookSpace catalogue

mod book;
mod book_genre;
mod book_tag;
mod comment;
mod genre;
mod tag;
mod user;

pub use user::{
    Entity as UserEntity,
    Model as ApplicationUser,
    ActiveModel as UserActiveModel,
    Column as UserColumn,
};

pub use book::{
    Entity as BookEntity,
    Model as Book,
    ActiveModel as BookActiveModel,
    Column as BookColumn,
};

pub use genre::{
    Entity as GenreEntity,
    Model as Genre,
    ActiveModel as GenreActiveModel,
    Column as GenreColumn,
};

pub use tag::{
    Entity as TagEntity,
    Model as Tag,
    ActiveModel as TagActiveModel,
    Column as TagColumn,
};

pub use book_genre::{
    Entity as BookGenreEntity,
    Model as BookGenre,
    ActiveModel as BookGenreActiveModel,
    Column as BookGenreColumn,
};

pub use book_tag::{
    Entity as BookTagEntity,
    Model as BookTag,
    ActiveModel as BookTagActiveModel,
    Column as BookTagColumn,
};

pub use comment::{
    Entity as CommentEntity,
    Model as Comment,
    ActiveModel as CommentActiveModel,
    Column as CommentColumn,
};
