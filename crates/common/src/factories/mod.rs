//! Entity to response model mapping
//!
//! Factories are pure: they receive fully resolved data and never perform
//! I/O. Missing required fields fail with [`AppError::Mapping`]; missing
//! enrichment is carried as an explicit state.

mod models;

pub use models::{
    AnalysisStatus, BookResponse, BookSummary, CommentResponse, CoverImage, FaceAnalysis,
    GenreResponse, TagResponse, UserResponse,
};

use crate::db::models::{ApplicationUser, Book, Comment, Genre, Tag};
use crate::db::BookGraph;
use crate::errors::{AppError, Result};
use chrono::{DateTime, SecondsFormat, Utc};

/// Maps one input shape to a response model
pub trait ResponseFactory<Input> {
    type Output;

    fn create(&self, input: Input) -> Result<Self::Output>;
}

/// Everything needed to build a [`BookResponse`]
#[derive(Debug, Clone)]
pub struct BookSource {
    pub graph: BookGraph,
    pub comments: Vec<Comment>,
    pub cover: CoverImage,
    pub analysis: FaceAnalysis,
}

fn required(entity: &str, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::mapping(entity, field));
    }
    Ok(())
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GenreFactory;

impl<'a> ResponseFactory<&'a Genre> for GenreFactory {
    type Output = GenreResponse;

    fn create(&self, genre: &'a Genre) -> Result<GenreResponse> {
        required("genre", "name", &genre.name)?;
        Ok(GenreResponse {
            id: genre.id.clone(),
            name: genre.name.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TagFactory;

impl<'a> ResponseFactory<&'a Tag> for TagFactory {
    type Output = TagResponse;

    fn create(&self, tag: &'a Tag) -> Result<TagResponse> {
        required("tag", "name", &tag.name)?;
        Ok(TagResponse {
            id: tag.id.clone(),
            name: tag.name.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CommentFactory;

impl<'a> ResponseFactory<&'a Comment> for CommentFactory {
    type Output = CommentResponse;

    fn create(&self, comment: &'a Comment) -> Result<CommentResponse> {
        Ok(CommentResponse {
            id: comment.id.clone(),
            content: comment.content.clone(),
            date: timestamp(&comment.date),
            book_id: comment.book_id.clone(),
            user_id: comment.user_id.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UserFactory;

impl<'a> ResponseFactory<&'a ApplicationUser> for UserFactory {
    type Output = UserResponse;

    fn create(&self, user: &'a ApplicationUser) -> Result<UserResponse> {
        required("user", "user_name", &user.user_name)?;
        let display_name = user
            .display_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| user.user_name.clone());

        Ok(UserResponse {
            id: user.id.clone(),
            user_name: user.user_name.clone(),
            display_name,
            email: user.email.clone(),
            created_at: timestamp(&user.created_at),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BookFactory;

impl ResponseFactory<BookSource> for BookFactory {
    type Output = BookResponse;

    fn create(&self, source: BookSource) -> Result<BookResponse> {
        let BookSource {
            graph,
            comments,
            cover,
            analysis,
        } = source;
        let book = graph.book;

        required("book", "title", &book.title)?;
        required("book", "author", &book.author)?;

        let genres = graph
            .genres
            .iter()
            .map(|g| GenreFactory.create(g))
            .collect::<Result<Vec<_>>>()?;
        let tags = graph
            .tags
            .iter()
            .map(|t| TagFactory.create(t))
            .collect::<Result<Vec<_>>>()?;
        let comments = comments
            .iter()
            .map(|c| CommentFactory.create(c))
            .collect::<Result<Vec<_>>>()?;

        let (face_analysis, faces) = match analysis {
            FaceAnalysis::Skipped => (AnalysisStatus::Skipped, Vec::new()),
            FaceAnalysis::Unavailable => (AnalysisStatus::Unavailable, Vec::new()),
            FaceAnalysis::Detected(faces) => (AnalysisStatus::Complete, faces),
        };

        Ok(BookResponse {
            created_at: timestamp(&book.created_at),
            id: book.id,
            title: book.title,
            author: book.author,
            description: book.description,
            publisher: book.publisher,
            page_count: book.page_count,
            owner_id: book.user_id,
            genres,
            tags,
            comments,
            cover,
            face_analysis,
            faces,
        })
    }
}

impl<'a> ResponseFactory<&'a Book> for BookFactory {
    type Output = BookSummary;

    fn create(&self, book: &'a Book) -> Result<BookSummary> {
        required("book", "title", &book.title)?;
        required("book", "author", &book.author)?;
        Ok(BookSummary {
            id: book.id.clone(),
            title: book.title.clone(),
            author: book.author.clone(),
            owner_id: book.user_id.clone(),
            has_cover: book.cover_key.is_some(),
        })
    }
}
