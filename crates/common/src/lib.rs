//! BookSpace Common Library
//!
//! Catalogue core shared by the BookSpace services:
//! - Entities, generic repositories and the request-scoped unit of work
//! - Response factories
//! - Cover storage and face detection clients
//! - Book enrichment service
//! - Error types, configuration and metrics

pub mod blob;
pub mod config;
pub mod db;
pub mod errors;
pub mod faces;
pub mod factories;
pub mod metrics;
pub mod services;

// Re-export commonly used types
pub use blob::BlobStorage;
pub use config::AppConfig;
pub use db::{DbContext, DbPool, Repository};
pub use errors::{AppError, Result};
pub use faces::FaceDetector;
pub use factories::ResponseFactory;
pub use services::BookDataService;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
