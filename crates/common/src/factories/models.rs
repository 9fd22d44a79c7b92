//! Response models handed to the presentation layer

use crate::faces::FaceAttributes;
use serde::Serialize;

/// Outcome of resolving a book's cover image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CoverImage {
    /// The book has no cover key
    NotUploaded,
    /// A cover key exists but the bytes could not be fetched
    Unavailable,
    Available {
        url: String,
        size_bytes: u64,
        /// Hex SHA-256 of the fetched bytes
        content_hash: String,
    },
}

impl CoverImage {
    pub fn url(&self) -> Option<&str> {
        match self {
            CoverImage::Available { url, .. } => Some(url),
            _ => None,
        }
    }
}

/// Outcome of face analysis on a cover
#[derive(Debug, Clone, PartialEq)]
pub enum FaceAnalysis {
    /// No cover bytes to analyze
    Skipped,
    /// The detector failed or timed out
    Unavailable,
    Detected(Vec<FaceAttributes>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Skipped,
    Unavailable,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenreResponse {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagResponse {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentResponse {
    pub id: String,
    pub content: String,
    /// RFC 3339
    pub date: String,
    pub book_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub user_name: String,
    /// Display name, falling back to the user name
    pub display_name: String,
    pub email: String,
    pub created_at: String,
}

/// Fully enriched book
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookResponse {
    pub id: String,
    pub title: String,
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<i32>,
    pub owner_id: String,
    pub created_at: String,
    pub genres: Vec<GenreResponse>,
    pub tags: Vec<TagResponse>,
    pub comments: Vec<CommentResponse>,
    pub cover: CoverImage,
    pub face_analysis: AnalysisStatus,
    pub faces: Vec<FaceAttributes>,
}

/// Book row for listings; carries no enrichment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookSummary {
    pub id: String,
    pub title: String,
    pub author: String,
    pub owner_id: String,
    pub has_cover: bool,
}
