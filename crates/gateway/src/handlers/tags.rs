//! Tag handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use validator::Validate;

use super::{books::summaries, not_blank, validated};
use crate::AppState;
use bookspace_common::{
    db::{models::Tag, new_id, Repository},
    errors::{AppError, Result},
    factories::{BookSummary, TagFactory, TagResponse, ResponseFactory},
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTagRequest {
    #[validate(length(min = 1, max = 64), custom(function = "not_blank"))]
    pub name: String,
}

/// List tags by name
pub async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<TagResponse>>> {
    let ctx = state.db.begin_scope();
    let tags = ctx.tags().list().await?;
    Ok(Json(
        tags
            .iter()
            .map(|t| TagFactory.create(t))
            .collect::<Result<Vec<_>>>()?,
    ))
}

/// Create a tag; names are unique
pub async fn create_tag(
    State(state): State<AppState>,
    Json(request): Json<CreateTagRequest>,
) -> Result<(StatusCode, Json<TagResponse>)> {
    validated(&request)?;
    let ctx = state.db.begin_scope();
    let name = request.name.trim().to_string();

    if ctx.tags().find_by_name(&name).await?.is_some() {
        return Err(AppError::Conflict {
            message: format!("tag {:?} already exists", name),
        });
    }

    let tag = Tag { id: new_id(), name };
    let response = TagFactory.create(&tag)?;

    ctx.tags().add(tag).await?;
    ctx.save_changes().await?;

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn get_tag(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TagResponse>> {
    let ctx = state.db.begin_scope();
    let tag = ctx.tags().get_by_id(id).await?;
    Ok(Json(TagFactory.create(&tag)?))
}

/// Delete a tag; it is removed from every book
pub async fn delete_tag(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let ctx = state.db.begin_scope();
    ctx.tags().delete(id).await?;
    ctx.save_changes().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Books carrying a tag
pub async fn tag_books(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<BookSummary>>> {
    let ctx = state.db.begin_scope();
    ctx.tags().get_by_id(id.clone()).await?;
    let books = ctx.books().find_by_tag(&id).await?;
    Ok(Json(summaries(&books)?))
}
