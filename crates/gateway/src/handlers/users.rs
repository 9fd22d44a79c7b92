//! User handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use validator::Validate;

use super::{not_blank, validated};
use crate::AppState;
use bookspace_common::{
    db::{models::ApplicationUser, new_id, Repository},
    errors::{AppError, Result},
    factories::{ResponseFactory, UserFactory, UserResponse},
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 64), custom(function = "not_blank"))]
    pub user_name: String,

    #[validate(email)]
    pub email: String,

    #[validate(length(max = 128))]
    pub display_name: Option<String>,
}

/// Register a user; user names and emails are unique
pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    validated(&request)?;
    let ctx = state.db.begin_scope();
    let users = ctx.users();

    let email = request.email.to_lowercase();
    if users.find_by_user_name(&request.user_name).await?.is_some() {
        return Err(AppError::Conflict {
            message: format!("user name {:?} is taken", request.user_name),
        });
    }
    if users.find_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict {
            message: "email is already registered".to_string(),
        });
    }

    let user = ApplicationUser {
        id: new_id(),
        user_name: request.user_name,
        email,
        display_name: request.display_name,
        created_at: Utc::now(),
    };
    let response = UserFactory.create(&user)?;

    users.add(user).await?;
    users.save_changes().await?;

    tracing::info!(user_id = %response.id, "User registered");
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>> {
    let ctx = state.db.begin_scope();
    let user = ctx.users().get_by_id(id).await?;
    Ok(Json(UserFactory.create(&user)?))
}
