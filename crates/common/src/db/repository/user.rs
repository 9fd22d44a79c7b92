//! Application user queries

use super::BaseRepository;
use crate::db::models::*;
use crate::errors::Result;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

impl BaseRepository<UserEntity> {
    pub async fn find_by_user_name(&self, user_name: &str) -> Result<Option<ApplicationUser>> {
        UserEntity::find()
            .filter(UserColumn::UserName.eq(user_name))
            .one(self.ctx().conn())
            .await
            .map_err(Into::into)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<ApplicationUser>> {
        UserEntity::find()
            .filter(UserColumn::Email.eq(email))
            .one(self.ctx().conn())
            .await
            .map_err(Into::into)
    }
}
