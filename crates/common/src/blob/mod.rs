//! Cover image storage
//!
//! Provides a key-addressed byte store behind the [`BlobStorage`] trait:
//! - Container-style REST object store (Azure Blob compatible)
//! - In-process store for local runs and tests
//!
//! Clients never retry; retry policy belongs to the caller.

use crate::config::BlobStorageConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// Trait for cover image storage
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Store bytes under `key`, replacing any previous object; returns the public URL
    async fn store(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;

    /// Fetch the object stored under `key`
    async fn fetch(&self, key: &str) -> Result<Vec<u8>>;

    /// Remove the object stored under `key`
    async fn delete(&self, key: &str) -> Result<()>;

    /// Public URL of `key`; performs no I/O
    fn url_for(&self, key: &str) -> String;
}

fn unavailable(message: impl Into<String>) -> AppError {
    AppError::StorageUnavailable {
        message: message.into(),
    }
}

fn missing(key: &str) -> AppError {
    AppError::not_found("blob", key)
}

fn check_key(key: &str) -> Result<()> {
    if key.is_empty() || key.starts_with('/') {
        return Err(AppError::Validation {
            message: format!("invalid blob key {:?}", key),
            field: Some("key".to_string()),
        });
    }
    Ok(())
}

/// REST object store client
///
/// Objects live at `{endpoint}/{container}/{key}`, with every key segment
/// percent-encoded. The optional SAS token is the query string of every
/// authenticated request.
pub struct HttpBlobStorage {
    client: reqwest::Client,
    base: Url,
    container: String,
    sas_token: Option<String>,
}

impl HttpBlobStorage {
    /// Create a new client
    pub fn new(
        endpoint: &str,
        container: &str,
        sas_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let base = Url::parse(endpoint)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| AppError::Configuration {
                message: format!("invalid blob storage endpoint {:?}", endpoint),
            })?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create blob storage HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base,
            container: container.trim_matches('/').to_string(),
            sas_token: sas_token.map(|t| t.trim_start_matches('?').to_string()),
        })
    }

    fn object_url(&self, key: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push(&self.container)
                .extend(key.split('/'));
        }
        url
    }

    fn signed_url(&self, key: &str) -> Url {
        let mut url = self.object_url(key);
        if let Some(token) = &self.sas_token {
            url.set_query(Some(token));
        }
        url
    }
}

#[async_trait]
impl BlobStorage for HttpBlobStorage {
    async fn store(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        check_key(key)?;
        let size = bytes.len();

        let response = self
            .client
            .put(self.signed_url(key))
            .header("x-ms-blob-type", "BlockBlob")
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| unavailable(format!("PUT {} failed: {}", key, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(unavailable(format!("PUT {} returned {}: {}", key, status, body)));
        }

        debug!(key, size, "Blob stored");
        Ok(self.url_for(key))
    }

    async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        check_key(key)?;

        let response = self
            .client
            .get(self.signed_url(key))
            .send()
            .await
            .map_err(|e| unavailable(format!("GET {} failed: {}", key, e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(missing(key)),
            status if status.is_success() => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| unavailable(format!("GET {} body: {}", key, e)))?;
                Ok(bytes.to_vec())
            }
            status => Err(unavailable(format!("GET {} returned {}", key, status))),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        check_key(key)?;

        let response = self
            .client
            .delete(self.signed_url(key))
            .send()
            .await
            .map_err(|e| unavailable(format!("DELETE {} failed: {}", key, e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(missing(key)),
            status if status.is_success() => {
                debug!(key, "Blob deleted");
                Ok(())
            }
            status => Err(unavailable(format!("DELETE {} returned {}", key, status))),
        }
    }

    fn url_for(&self, key: &str) -> String {
        self.object_url(key).to_string()
    }
}

/// In-process blob store for local runs and testing
pub struct InMemoryBlobStorage {
    base_url: String,
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryBlobStorage {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored objects
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.objects.read().await.contains_key(key)
    }
}

#[async_trait]
impl BlobStorage for InMemoryBlobStorage {
    async fn store(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String> {
        check_key(key)?;
        self.objects.write().await.insert(key.to_string(), bytes);
        Ok(self.url_for(key))
    }

    async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        check_key(key)?;
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| missing(key))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        check_key(key)?;
        self.objects
            .write()
            .await
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| missing(key))
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}

/// Create a blob store based on configuration
pub fn create_blob_storage(config: &BlobStorageConfig) -> Result<Arc<dyn BlobStorage>> {
    match config.provider.as_str() {
        "azure" | "http" => {
            let endpoint = config.endpoint.as_deref().ok_or_else(|| AppError::Configuration {
                message: "blob_storage.endpoint is required for the azure provider".to_string(),
            })?;
            Ok(Arc::new(HttpBlobStorage::new(
                endpoint,
                &config.container,
                config.sas_token.clone(),
                Duration::from_secs(config.timeout_secs),
            )?))
        }
        "memory" => Ok(Arc::new(InMemoryBlobStorage::new(&format!(
            "memory://{}",
            config.container
        )))),
        other => {
            tracing::warn!(provider = other, "Unknown blob storage provider, using in-memory store");
            Ok(Arc::new(InMemoryBlobStorage::new(&format!(
                "memory://{}",
                config.container
            ))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Bytes,
        extract::{Path, Query, State},
        routing::put,
        Router,
    };
    use std::sync::Mutex;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_memory_store_fetch_delete() {
        let store = InMemoryBlobStorage::new("memory://covers/");
        let url = store.store("covers/abc", vec![1, 2, 3], "image/png").await.unwrap();
        assert_eq!(url, "memory://covers/covers/abc");

        assert_eq!(store.fetch("covers/abc").await.unwrap(), vec![1, 2, 3]);
        store.delete("covers/abc").await.unwrap();
        assert!(store.is_empty().await);

        let err = store.fetch("covers/abc").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_invalid_keys_rejected() {
        let store = InMemoryBlobStorage::new("memory://covers");
        assert!(matches!(
            store.store("", vec![1], "image/png").await,
            Err(AppError::Validation { .. })
        ));
        assert!(store.fetch("/absolute").await.is_err());
    }

    #[test]
    fn test_http_urls() {
        let store = HttpBlobStorage::new(
            "https://acct.blob.core.windows.net/",
            "/covers/",
            Some("?sv=2024&sig=abc".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(
            store.url_for("covers/abc"),
            "https://acct.blob.core.windows.net/covers/covers/abc"
        );
        assert_eq!(
            store.signed_url("k").as_str(),
            "https://acct.blob.core.windows.net/covers/k?sv=2024&sig=abc"
        );
    }

    #[test]
    fn test_reserved_characters_stay_in_the_key() {
        let store = HttpBlobStorage::new(
            "https://acct.blob.core.windows.net",
            "covers",
            Some("sv=1&sig=s".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();

        let url = store.signed_url("cover#1?v=2");
        assert_eq!(url.path(), "/covers/cover%231%3Fv=2");
        assert_eq!(url.query(), Some("sv=1&sig=s"));
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn test_invalid_endpoint_is_configuration_error() {
        let result = HttpBlobStorage::new("not a url", "covers", None, Duration::from_secs(5));
        assert!(matches!(result, Err(AppError::Configuration { .. })));
    }

    type Objects = Arc<Mutex<HashMap<String, Vec<u8>>>>;

    fn signed(query: &HashMap<String, String>) -> bool {
        query.get("sig").map(String::as_str) == Some("s")
    }

    async fn put_object(
        State(objects): State<Objects>,
        Path(key): Path<String>,
        Query(query): Query<HashMap<String, String>>,
        body: Bytes,
    ) -> StatusCode {
        if !signed(&query) {
            return StatusCode::FORBIDDEN;
        }
        objects.lock().unwrap().insert(key, body.to_vec());
        StatusCode::CREATED
    }

    async fn get_object(
        State(objects): State<Objects>,
        Path(key): Path<String>,
        Query(query): Query<HashMap<String, String>>,
    ) -> std::result::Result<Vec<u8>, StatusCode> {
        if !signed(&query) {
            return Err(StatusCode::FORBIDDEN);
        }
        objects.lock().unwrap().get(&key).cloned().ok_or(StatusCode::NOT_FOUND)
    }

    async fn delete_object(
        State(objects): State<Objects>,
        Path(key): Path<String>,
        Query(query): Query<HashMap<String, String>>,
    ) -> StatusCode {
        if !signed(&query) {
            return StatusCode::FORBIDDEN;
        }
        match objects.lock().unwrap().remove(&key) {
            Some(_) => StatusCode::ACCEPTED,
            None => StatusCode::NOT_FOUND,
        }
    }

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{addr}")
    }

    async fn container_server() -> (String, Objects) {
        let objects = Objects::default();
        let router = Router::new()
            .route(
                "/covers/{*key}",
                put(put_object).get(get_object).delete(delete_object),
            )
            .with_state(objects.clone());
        (serve(router).await, objects)
    }

    fn client(endpoint: &str) -> HttpBlobStorage {
        HttpBlobStorage::new(
            endpoint,
            "covers",
            Some("sv=1&sig=s".to_string()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_http_store_fetch_delete() {
        let (endpoint, objects) = container_server().await;
        let store = client(&endpoint);

        let url = store.store("covers/abc", vec![7, 8, 9], "image/png").await.unwrap();
        assert_eq!(url, format!("{endpoint}/covers/covers/abc"));
        assert!(objects.lock().unwrap().contains_key("covers/abc"));

        assert_eq!(store.fetch("covers/abc").await.unwrap(), vec![7, 8, 9]);
        store.delete("covers/abc").await.unwrap();
        assert!(objects.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_http_reserved_key_keeps_signature() {
        let (endpoint, objects) = container_server().await;
        let store = client(&endpoint);

        store.store("cover#1", vec![1], "image/png").await.unwrap();
        assert!(objects.lock().unwrap().contains_key("cover#1"));
        assert_eq!(store.fetch("cover#1").await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_http_missing_object_is_not_found() {
        let (endpoint, _) = container_server().await;
        let store = client(&endpoint);

        let err = store.fetch("covers/none").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
        let err = store.delete("covers/none").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_http_server_errors_are_unavailable() {
        let endpoint =
            serve(Router::new().fallback(|| async { StatusCode::INTERNAL_SERVER_ERROR })).await;
        let store = client(&endpoint);

        let err = store.fetch("covers/abc").await.unwrap_err();
        assert!(matches!(err, AppError::StorageUnavailable { .. }));
        assert!(err.is_transient());
        assert!(matches!(
            store.delete("covers/abc").await,
            Err(AppError::StorageUnavailable { .. })
        ));
        assert!(matches!(
            store.store("covers/abc", vec![1], "image/png").await,
            Err(AppError::StorageUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_unavailable() {
        let store =
            HttpBlobStorage::new("http://127.0.0.1:1", "covers", None, Duration::from_secs(2))
                .unwrap();
        let err = store.fetch("covers/abc").await.unwrap_err();
        assert!(matches!(err, AppError::StorageUnavailable { .. }));
    }

    #[test]
    fn test_factory_requires_endpoint() {
        let config = BlobStorageConfig::default();
        assert!(matches!(
            create_blob_storage(&config),
            Err(AppError::Configuration { .. })
        ));

        let memory = BlobStorageConfig {
            provider: "memory".to_string(),
            ..BlobStorageConfig::default()
        };
        let store = create_blob_storage(&memory).unwrap();
        assert_eq!(store.url_for("x"), "memory://covers/x");
    }
}
