//! Repository pattern for database operations
//!
//! [`Repository`] is the uniform CRUD contract every entity gets. It is
//! implemented once, generically, by [`BaseRepository`]; per-entity modules
//! add read-only queries as inherent methods on `BaseRepository<Entity>`.
//! Writes are staged on the owning [`DbContext`] and only reach the store
//! on [`Repository::save_changes`].

mod book;
mod book_genre;
mod book_tag;
mod comment;
mod genre;
mod tag;
mod user;

pub use book::BookGraph;

use crate::db::context::{DbContext, StagedWrite};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use sea_orm::{
    ActiveModelTrait, DatabaseTransaction, DbErr, DeleteMany, EntityTrait, IntoActiveModel,
    PrimaryKeyTrait,
};
use std::fmt::Debug;
use std::marker::PhantomData;

/// Primary key value of an entity (a tuple for join entities)
pub type Id<E> = <<E as EntityTrait>::PrimaryKey as PrimaryKeyTrait>::ValueType;

/// Uniform CRUD contract shared by every entity
#[async_trait]
pub trait Repository<E>: Send + Sync
where
    E: EntityTrait,
{
    /// Load one entity, or fail with `NotFound`
    async fn get_by_id(&self, id: Id<E>) -> Result<E::Model>;

    /// Stream every row; each call starts a fresh query
    async fn get_all<'a>(&'a self) -> Result<BoxStream<'a, Result<E::Model>>>;

    /// Stage an insert
    async fn add(&self, model: E::Model) -> Result<()>;

    /// Stage a full-row update
    async fn update(&self, model: E::Model) -> Result<()>;

    /// Stage a delete; fails with `NotFound` when the row does not exist
    async fn delete(&self, id: Id<E>) -> Result<()>;

    /// Commit everything staged in the owning context
    async fn save_changes(&self) -> Result<u64>;
}

/// Generic repository backed by the request-scoped [`DbContext`]
#[derive(Clone)]
pub struct BaseRepository<E: EntityTrait> {
    ctx: DbContext,
    _entity: PhantomData<fn() -> E>,
}

impl<E: EntityTrait> BaseRepository<E> {
    pub(crate) fn new(ctx: DbContext) -> Self {
        Self {
            ctx,
            _entity: PhantomData,
        }
    }

    pub(crate) fn ctx(&self) -> &DbContext {
        &self.ctx
    }

    fn table() -> String {
        E::default().table_name().to_string()
    }

    fn not_found(id: &Id<E>) -> AppError {
        AppError::NotFound {
            resource_type: Self::table(),
            id: format_id(id),
        }
    }
}

/// Render a key for messages: `b1`, or `(b1, g1)` for composite keys
fn format_id<T: Debug>(id: &T) -> String {
    format!("{:?}", id).replace('"', "")
}

#[async_trait]
impl<E> Repository<E> for BaseRepository<E>
where
    E: EntityTrait,
    E::Model: IntoActiveModel<E::ActiveModel> + Sync,
    E::ActiveModel: ActiveModelTrait<Entity = E> + Send + Sync + 'static,
    Id<E>: Clone + Sync,
{
    async fn get_by_id(&self, id: Id<E>) -> Result<E::Model> {
        E::find_by_id(id.clone())
            .one(self.ctx.conn())
            .await?
            .ok_or_else(|| Self::not_found(&id))
    }

    async fn get_all<'a>(&'a self) -> Result<BoxStream<'a, Result<E::Model>>> {
        let rows = E::find().stream(self.ctx.conn()).await?;
        Ok(rows.map(|row| row.map_err(AppError::from)).boxed())
    }

    async fn add(&self, model: E::Model) -> Result<()> {
        let write = Insert::<E> {
            table: Self::table(),
            model: model.into_active_model(),
        };
        self.ctx.stage(Box::new(write)).await;
        Ok(())
    }

    async fn update(&self, model: E::Model) -> Result<()> {
        // Every column is marked dirty so the whole row is written back.
        let write = Update::<E> {
            table: Self::table(),
            model: model.into_active_model().reset_all(),
        };
        self.ctx.stage(Box::new(write)).await;
        Ok(())
    }

    async fn delete(&self, id: Id<E>) -> Result<()> {
        let exists = E::find_by_id(id.clone()).one(self.ctx.conn()).await?.is_some();
        if !exists {
            return Err(Self::not_found(&id));
        }

        let key = format_id(&id);
        let target = format!("{}:{}", Self::table(), key);
        let write = Remove::<E> {
            table: Self::table(),
            key,
            query: E::delete_by_id(id.clone()),
        };

        if self.ctx.stage_removal(target, Box::new(write)).await {
            Ok(())
        } else {
            Err(Self::not_found(&id))
        }
    }

    async fn save_changes(&self) -> Result<u64> {
        self.ctx.save_changes().await
    }
}

struct Insert<E: EntityTrait> {
    table: String,
    model: E::ActiveModel,
}

#[async_trait]
impl<E> StagedWrite for Insert<E>
where
    E: EntityTrait,
    E::Model: IntoActiveModel<E::ActiveModel>,
    E::ActiveModel: ActiveModelTrait<Entity = E> + Send + 'static,
{
    fn entity(&self) -> &str {
        &self.table
    }

    async fn apply(self: Box<Self>, txn: &DatabaseTransaction) -> std::result::Result<u64, DbErr> {
        E::insert(self.model).exec_without_returning(txn).await
    }
}

struct Update<E: EntityTrait> {
    table: String,
    model: E::ActiveModel,
}

#[async_trait]
impl<E> StagedWrite for Update<E>
where
    E: EntityTrait,
    E::Model: IntoActiveModel<E::ActiveModel>,
    E::ActiveModel: ActiveModelTrait<Entity = E> + Send + 'static,
{
    fn entity(&self) -> &str {
        &self.table
    }

    async fn apply(self: Box<Self>, txn: &DatabaseTransaction) -> std::result::Result<u64, DbErr> {
        self.model.update(txn).await?;
        Ok(1)
    }
}

struct Remove<E: EntityTrait> {
    table: String,
    key: String,
    query: DeleteMany<E>,
}

#[async_trait]
impl<E: EntityTrait> StagedWrite for Remove<E> {
    fn entity(&self) -> &str {
        &self.table
    }

    async fn apply(self: Box<Self>, txn: &DatabaseTransaction) -> std::result::Result<u64, DbErr> {
        let result = self.query.exec(txn).await?;
        if result.rows_affected == 0 {
            // Someone else removed the row between staging and commit.
            return Err(DbErr::RecordNotFound(self.key));
        }
        Ok(result.rows_affected)
    }
}
