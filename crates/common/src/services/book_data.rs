//! Book read model assembly and cover management

use crate::blob::BlobStorage;
use crate::config::{EnrichmentConfig, RetryConfig};
use crate::db::{DbContext, Repository};
use crate::errors::{AppError, Result};
use crate::factories::{
    BookFactory, BookResponse, BookSource, BookSummary, CoverImage, FaceAnalysis, ResponseFactory,
};
use crate::faces::FaceDetector;
use crate::metrics;
use backoff::ExponentialBackoffBuilder;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy)]
enum Enrichment {
    BlobStorage,
    FaceDetection,
}

impl Enrichment {
    fn label(self) -> &'static str {
        match self {
            Enrichment::BlobStorage => "blob_storage",
            Enrichment::FaceDetection => "face_detection",
        }
    }

    fn unavailable(self, message: String) -> AppError {
        match self {
            Enrichment::BlobStorage => AppError::StorageUnavailable { message },
            Enrichment::FaceDetection => AppError::AnalysisUnavailable { message },
        }
    }
}

/// Storage key for a cover: `covers/{sha256 hex}` of its bytes
pub fn cover_key(bytes: &[u8]) -> String {
    format!("covers/{}", hex::encode(Sha256::digest(bytes)))
}

/// Assembles enriched books from the catalogue, blob storage and face detection
pub struct BookDataService {
    blobs: Arc<dyn BlobStorage>,
    faces: Arc<dyn FaceDetector>,
    policy: EnrichmentConfig,
}

impl BookDataService {
    pub fn new(
        blobs: Arc<dyn BlobStorage>,
        faces: Arc<dyn FaceDetector>,
        policy: EnrichmentConfig,
    ) -> Self {
        Self {
            blobs,
            faces,
            policy,
        }
    }

    /// Load a book with its classification, comments, cover and detected faces.
    ///
    /// Catalogue errors propagate. Blob storage and face detection failures
    /// degrade the response to an explicit unavailable state instead.
    #[instrument(skip(self, ctx))]
    pub async fn get_enriched_book(&self, ctx: &DbContext, id: &str) -> Result<BookResponse> {
        let graph = ctx.books().find_graph(id).await?;
        let comments = ctx.comments().find_by_book(id).await?;

        let (cover, analysis) = match graph.book.cover_key.as_deref() {
            None => (CoverImage::NotUploaded, FaceAnalysis::Skipped),
            Some(key) => self.enrich(key).await,
        };

        BookFactory.create(BookSource {
            graph,
            comments,
            cover,
            analysis,
        })
    }

    /// All books as summaries, without enrichment
    pub async fn list_books(&self, ctx: &DbContext) -> Result<Vec<BookSummary>> {
        ctx.books()
            .list()
            .await?
            .iter()
            .map(|book| BookFactory.create(book))
            .collect()
    }

    /// Store a new cover and point the book at it, returning the cover URL.
    ///
    /// Commits the scope. When the commit fails the freshly stored blob is
    /// removed again; the previous cover is removed once nothing refers to it.
    #[instrument(skip(self, ctx, bytes), fields(size = bytes.len()))]
    pub async fn upload_cover(
        &self,
        ctx: &DbContext,
        book_id: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String> {
        if bytes.is_empty() {
            return Err(AppError::Validation {
                message: "cover image is empty".to_string(),
                field: Some("body".to_string()),
            });
        }

        let books = ctx.books();
        let mut book = books.get_by_id(book_id.to_string()).await?;

        let key = cover_key(&bytes);
        let url = self.blobs.store(&key, bytes, content_type).await?;

        let previous = book.cover_key.replace(key.clone());
        books.update(book).await?;

        if let Err(err) = ctx.save_changes().await {
            if previous.as_deref() != Some(key.as_str()) {
                self.release_blob(ctx, &key, book_id).await;
            }
            return Err(err);
        }

        metrics::record_cover_upload();
        info!(book_id, key = %key, "Cover uploaded");

        if let Some(old) = previous.filter(|old| *old != key) {
            self.release_blob(ctx, &old, book_id).await;
        }

        Ok(url)
    }

    /// Detach the cover from a book and delete it from storage when unused.
    /// Commits the scope; a book without a cover is left untouched.
    #[instrument(skip(self, ctx))]
    pub async fn remove_cover(&self, ctx: &DbContext, book_id: &str) -> Result<()> {
        let books = ctx.books();
        let mut book = books.get_by_id(book_id.to_string()).await?;

        let Some(key) = book.cover_key.take() else {
            return Ok(());
        };

        books.update(book).await?;
        ctx.save_changes().await?;

        self.release_blob(ctx, &key, book_id).await;
        Ok(())
    }

    /// Delete a book (its comments and classification links cascade) and
    /// release its cover. Commits the scope.
    #[instrument(skip(self, ctx))]
    pub async fn delete_book(&self, ctx: &DbContext, book_id: &str) -> Result<()> {
        let books = ctx.books();
        let book = books.get_by_id(book_id.to_string()).await?;

        books.delete(book.id.clone()).await?;
        ctx.save_changes().await?;
        info!(book_id, "Book deleted");

        if let Some(key) = book.cover_key {
            self.release_blob(ctx, &key, book_id).await;
        }
        Ok(())
    }

    /// Best-effort delete of a blob no other book refers to
    async fn release_blob(&self, ctx: &DbContext, key: &str, book_id: &str) {
        match ctx.books().cover_in_use(key, book_id).await {
            Ok(false) => {}
            Ok(true) => {
                debug!(key, "Cover still referenced, keeping blob");
                return;
            }
            Err(err) => {
                warn!(key, error = %err, "Could not check cover references, keeping blob");
                return;
            }
        }

        if let Err(err) = self.blobs.delete(key).await {
            warn!(key, error = %err, "Failed to delete cover blob");
        }
    }

    async fn enrich(&self, key: &str) -> (CoverImage, FaceAnalysis) {
        let bytes = match self
            .call(Enrichment::BlobStorage, || self.blobs.fetch(key))
            .await
        {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(key, error = %err, "Cover unavailable, skipping face analysis");
                return (CoverImage::Unavailable, FaceAnalysis::Skipped);
            }
        };

        let cover = CoverImage::Available {
            url: self.blobs.url_for(key),
            size_bytes: bytes.len() as u64,
            content_hash: hex::encode(Sha256::digest(&bytes)),
        };

        let analysis = match self
            .call(Enrichment::FaceDetection, || self.faces.analyze(&bytes))
            .await
        {
            Ok(faces) => FaceAnalysis::Detected(faces),
            Err(err) => {
                warn!(
                    key,
                    detector = self.faces.name(),
                    error = %err,
                    "Face analysis unavailable"
                );
                FaceAnalysis::Unavailable
            }
        };

        (cover, analysis)
    }

    /// Run one enrichment call under the configured timeout and retry policy
    async fn call<T, F, Fut>(&self, service: Enrichment, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let timeout = self.policy.call_timeout();
        let op = &op;

        let attempt = move || async move {
            match tokio::time::timeout(timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(service.unavailable(format!("timed out after {:?}", timeout))),
            }
        };

        let result = match &self.policy.retry {
            None => attempt().await,
            Some(retry) => {
                backoff::future::retry_notify(
                    retry_policy(retry),
                    move || async move { attempt().await.map_err(classify) },
                    |err: AppError, wait: Duration| {
                        debug!(service = service.label(), error = %err, ?wait, "Retrying enrichment call");
                    },
                )
                .await
            }
        };

        metrics::record_enrichment(
            service.label(),
            started.elapsed().as_secs_f64(),
            result.is_ok(),
        );
        result
    }
}

fn retry_policy(retry: &RetryConfig) -> backoff::ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(retry.initial_interval_ms))
        .with_max_interval(Duration::from_millis(retry.max_interval_ms))
        .with_max_elapsed_time(Some(Duration::from_millis(retry.max_elapsed_ms)))
        .build()
}

fn classify(err: AppError) -> backoff::Error<AppError> {
    if err.is_transient() {
        backoff::Error::transient(err)
    } else {
        backoff::Error::permanent(err)
    }
}
