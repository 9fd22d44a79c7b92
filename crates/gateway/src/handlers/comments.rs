//! Comment handlers

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
    db::{models::Comment, new_id, Repository},
    errors::Result,
    factories::{CommentFactory, CommentResponse, ResponseFactory},
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    /// Author of the comment
    #[validate(length(min = 1))]
    pub user_id: String,

    #[validate(length(min = 1, max = 5000), custom(function = "not_blank"))]
    pub content: String,
}

/// Comments on a book, oldest first
pub async fn list_comments(
    State(state): State<AppState>,
    Path(book_id): Path<String>,
) -> Result<Json<Vec<CommentResponse>>> {
    let ctx = state.db.begin_scope();
    ctx.books().get_by_id(book_id.clone()).await?;

    let comments = ctx.comments().find_by_book(&book_id).await?;
    let body = comments
        .iter()
        .map(|c| CommentFactory.create(c))
        .collect::<Result<Vec<_>>>()?;

    Ok(Json(body))
}

/// Comment on a book
pub async fn create_comment(
    State(state): State<AppState>,
    Path(book_id): Path<String>,
    Json(request): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>)> {
    validated(&request)?;
    let ctx = state.db.begin_scope();
    ctx.books().get_by_id(book_id.clone()).await?;
    ctx.users().get_by_id(request.user_id.clone()).await?;

    let comment = Comment {
        id: new_id(),
        content: request.content,
        date: Utc::now(),
        book_id,
        user_id: request.user_id,
    };
    let response = CommentFactory.create(&comment)?;

    ctx.comments().add(comment).await?;
    ctx.save_changes().await?;

    tracing::info!(comment_id = %response.id, book_id = %response.book_id, "Comment added");
    Ok((StatusCode::CREATED, Json(response)))
}
