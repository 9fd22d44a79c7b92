//! Book handlers

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{not_blank, validated};
use crate::AppState;
use bookspace_common::{
    db::{models::*, new_id, DbContext, Repository},
    errors::{AppError, Result},
    factories::{BookFactory, BookResponse, BookSummary, ResponseFactory},
};

/// Request to create a book
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBookRequest {
    #[validate(length(min = 1, max = 500), custom(function = "not_blank"))]
    pub title: String,

    #[validate(length(min = 1, max = 300), custom(function = "not_blank"))]
    pub author: String,

    #[validate(length(max = 10000))]
    pub description: Option<String>,

    #[validate(length(max = 300))]
    pub publisher: Option<String>,

    #[validate(range(min = 1))]
    pub page_count: Option<i32>,

    /// Owning user
    #[validate(length(min = 1))]
    pub owner_id: String,
}

/// Partial update; absent fields are left unchanged
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateBookRequest {
    #[validate(length(min = 1, max = 500), custom(function = "not_blank"))]
    pub title: Option<String>,

    #[validate(length(min = 1, max = 300), custom(function = "not_blank"))]
    pub author: Option<String>,

    #[validate(length(max = 10000))]
    pub description: Option<String>,

    #[validate(length(max = 300))]
    pub publisher: Option<String>,

    #[validate(range(min = 1))]
    pub page_count: Option<i32>,
}

#[derive(Serialize)]
pub struct CoverResponse {
    pub url: String,
}

async fn ensure_book(ctx: &DbContext, id: &str) -> Result<Book> {
    ctx.books().get_by_id(id.to_string()).await
}

/// List all books
pub async fn list_books(State(state): State<AppState>) -> Result<Json<Vec<BookSummary>>> {
    let ctx = state.db.begin_scope();
    Ok(Json(state.books.list_books(&ctx).await?))
}

/// Create a book
pub async fn create_book(
    State(state): State<AppState>,
    Json(request): Json<CreateBookRequest>,
) -> Result<(StatusCode, Json<BookResponse>)> {
    validated(&request)?;
    let ctx = state.db.begin_scope();

    ctx.users()
        .get_by_id(request.owner_id.clone())
        .await
        .map_err(|e| match e {
            AppError::NotFound { .. } => AppError::Validation {
                message: format!("unknown owner {}", request.owner_id),
                field: Some("owner_id".to_string()),
            },
            other => other,
        })?;

    let book = Book {
        id: new_id(),
        title: request.title,
        author: request.author,
        description: request.description,
        cover_key: None,
        publisher: request.publisher,
        page_count: request.page_count,
        user_id: request.owner_id,
        created_at: Utc::now(),
    };
    let id = book.id.clone();

    ctx.books().add(book).await?;
    ctx.save_changes().await?;

    tracing::info!(book_id = %id, "Book created");

    let response = state.books.get_enriched_book(&ctx, &id).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Get a book with genres, tags, comments, cover and detected faces
pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BookResponse>> {
    let ctx = state.db.begin_scope();
    Ok(Json(state.books.get_enriched_book(&ctx, &id).await?))
}

/// Update book details
pub async fn update_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateBookRequest>,
) -> Result<Json<BookResponse>> {
    validated(&request)?;
    let ctx = state.db.begin_scope();
    let mut book = ensure_book(&ctx, &id).await?;

    if let Some(title) = request.title {
        book.title = title;
    }
    if let Some(author) = request.author {
        book.author = author;
    }
    if request.description.is_some() {
        book.description = request.description;
    }
    if request.publisher.is_some() {
        book.publisher = request.publisher;
    }
    if request.page_count.is_some() {
        book.page_count = request.page_count;
    }

    ctx.books().update(book).await?;
    ctx.save_changes().await?;

    Ok(Json(state.books.get_enriched_book(&ctx, &id).await?))
}

/// Delete a book and its cover
pub async fn delete_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let ctx = state.db.begin_scope();
    state.books.delete_book(&ctx, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Upload or replace the cover image; the body is the raw image
pub async fn upload_cover(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CoverResponse>> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if !content_type.starts_with("image/") {
        return Err(AppError::Validation {
            message: format!("expected an image content type, got {:?}", content_type),
            field: Some("content-type".to_string()),
        });
    }

    let ctx = state.db.begin_scope();
    let url = state
        .books
        .upload_cover(&ctx, &id, body.to_vec(), &content_type)
        .await?;

    Ok(Json(CoverResponse { url }))
}

/// Remove the cover image
pub async fn delete_cover(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let ctx = state.db.begin_scope();
    state.books.remove_cover(&ctx, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Classify a book under a genre
pub async fn add_genre(
    State(state): State<AppState>,
    Path((id, genre_id)): Path<(String, String)>,
) -> Result<StatusCode> {
    let ctx = state.db.begin_scope();
    ensure_book(&ctx, &id).await?;
    ctx.genres().get_by_id(genre_id.clone()).await?;

    let links = ctx.book_genres();
    match links.get_by_id((id.clone(), genre_id.clone())).await {
        Ok(_) => {
            return Err(AppError::Conflict {
                message: format!("book {} already has genre {}", id, genre_id),
            })
        }
        Err(AppError::NotFound { .. }) => {}
        Err(other) => return Err(other),
    }

    links.add(BookGenre { book_id: id, genre_id }).await?;
    links.save_changes().await?;
    Ok(StatusCode::CREATED)
}

/// Attach a tag to a book
pub async fn add_tag(
    State(state): State<AppState>,
    Path((id, tag_id)): Path<(String, String)>,
) -> Result<StatusCode> {
    let ctx = state.db.begin_scope();
    ensure_book(&ctx, &id).await?;
    ctx.tags().get_by_id(tag_id.clone()).await?;

    let links = ctx.book_tags();
    match links.get_by_id((id.clone(), tag_id.clone())).await {
        Ok(_) => {
            return Err(AppError::Conflict {
                message: format!("book {} already has tag {}", id, tag_id),
            })
        }
        Err(AppError::NotFound { .. }) => {}
        Err(other) => return Err(other),
    }

    links.add(BookTag { book_id: id, tag_id }).await?;
    links.save_changes().await?;
    Ok(StatusCode::CREATED)
}

/// Summaries for a list of books
pub(crate) fn summaries(books: &[Book]) -> Result<Vec<BookSummary>> {
    books.iter().map(|book| BookFactory.create(book)).collect()
}
