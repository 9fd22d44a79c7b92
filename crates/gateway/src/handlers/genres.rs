//! Genre handlers

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
    db::{models::Genre, new_id, Repository},
    errors::{AppError, Result},
    factories::{BookSummary, GenreFactory, GenreResponse, ResponseFactory},
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateGenreRequest {
    #[validate(length(min = 1, max = 100), custom(function = "not_blank"))]
    pub name: String,
}

/// List genres by name
pub async fn list_genres(State(state): State<AppState>) -> Result<Json<Vec<GenreResponse>>> {
    let ctx = state.db.begin_scope();
    let genres = ctx.genres().list().await?;
    Ok(Json(
        genres
            .iter()
            .map(|g| GenreFactory.create(g))
            .collect::<Result<Vec<_>>>()?,
    ))
}

/// Create a genre; names are unique
pub async fn create_genre(
    State(state): State<AppState>,
    Json(request): Json<CreateGenreRequest>,
) -> Result<(StatusCode, Json<GenreResponse>)> {
    validated(&request)?;
    let ctx = state.db.begin_scope();
    let name = request.name.trim().to_string();

    if ctx.genres().find_by_name(&name).await?.is_some() {
        return Err(AppError::Conflict {
            message: format!("genre {:?} already exists", name),
        });
    }

    let genre = Genre { id: new_id(), name };
    let response = GenreFactory.create(&genre)?;

    ctx.genres().add(genre).await?;
    ctx.save_changes().await?;

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn get_genre(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<GenreResponse>> {
    let ctx = state.db.begin_scope();
    let genre = ctx.genres().get_by_id(id).await?;
    Ok(Json(GenreFactory.create(&genre)?))
}

/// Delete a genre; books lose the classification
pub async fn delete_genre(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let ctx = state.db.begin_scope();
    ctx.genres().delete(id).await?;
    ctx.save_changes().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Books classified under a genre
pub async fn genre_books(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<BookSummary>>> {
    let ctx = state.db.begin_scope();
    ctx.genres().get_by_id(id.clone()).await?;
    let books = ctx.books().find_by_genre(&id).await?;
    Ok(Json(summaries(&books)?))
}
