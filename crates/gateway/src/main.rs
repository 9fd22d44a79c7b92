//! BookSpace API Gateway
//!
//! JSON entry point for the catalogue.
//! Handles:
//! - Request routing
//! - Request-scoped units of work
//! - Observability (logging, metrics, request ids)

mod handlers;
mod middleware;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use bookspace_common::{
    blob::create_blob_storage,
    config::{AppConfig, ObservabilityConfig},
    db::{schema, DbPool},
    faces::create_face_detector,
    metrics::{self, ENRICHMENT_BUCKETS, LATENCY_BUCKETS},
    services::BookDataService,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub books: Arc<BookDataService>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables and configuration
    dotenvy::dotenv().ok();
    let config = Arc::new(AppConfig::load()?);

    init_tracing(&config.observability);
    info!("Starting BookSpace API Gateway v{}", bookspace_common::VERSION);

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        install_metrics_exporter(&config.observability)?;
    }
    metrics::register_metrics();

    // Initialize database connection
    let db = DbPool::new(&config.database).await?;
    if config.database.create_schema {
        schema::create_tables(db.connection()).await?;
        info!("Schema ensured");
    }

    // Enrichment clients
    let blobs = create_blob_storage(&config.blob_storage)?;
    let faces = create_face_detector(&config.face)?;
    info!(
        blob_provider = %config.blob_storage.provider,
        face_provider = faces.name(),
        retry = config.enrichment.retry.is_some(),
        "Enrichment services configured"
    );

    let state = AppState {
        config: config.clone(),
        db,
        books: Arc::new(BookDataService::new(blobs, faces, config.enrichment.clone())),
    };

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn install_metrics_exporter(config: &ObservabilityConfig) -> anyhow::Result<()> {
    let port = config.metrics_port;
    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
        .add_global_label("service", &config.service_name)
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_request_duration_seconds", metrics::METRICS_PREFIX)),
            LATENCY_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_enrichment_duration_seconds", metrics::METRICS_PREFIX)),
            ENRICHMENT_BUCKETS,
        )?
        .install()?;

    info!(port, service = %config.service_name, "Prometheus exporter listening");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let api_routes = Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))

        // Book endpoints
        .route(
            "/books",
            get(handlers::books::list_books).post(handlers::books::create_book),
        )
        .route(
            "/books/{id}",
            get(handlers::books::get_book)
                .put(handlers::books::update_book)
                .delete(handlers::books::delete_book),
        )
        .route(
            "/books/{id}/cover",
            put(handlers::books::upload_cover).delete(handlers::books::delete_cover),
        )
        .route("/books/{id}/genres/{genre_id}", post(handlers::books::add_genre))
        .route("/books/{id}/tags/{tag_id}", post(handlers::books::add_tag))
        .route(
            "/books/{id}/comments",
            get(handlers::comments::list_comments).post(handlers::comments::create_comment),
        )

        // Genre endpoints
        .route(
            "/genres",
            get(handlers::genres::list_genres).post(handlers::genres::create_genre),
        )
        .route(
            "/genres/{id}",
            get(handlers::genres::get_genre).delete(handlers::genres::delete_genre),
        )
        .route("/genres/{id}/books", get(handlers::genres::genre_books))

        // Tag endpoints
        .route(
            "/tags",
            get(handlers::tags::list_tags).post(handlers::tags::create_tag),
        )
        .route(
            "/tags/{id}",
            get(handlers::tags::get_tag).delete(handlers::tags::delete_tag),
        )
        .route("/tags/{id}/books", get(handlers::tags::tag_books))

        // User endpoints
        .route("/users", post(handlers::users::create_user))
        .route("/users/{id}", get(handlers::users::get_user))
        .route_layer(axum::middleware::from_fn(middleware::track_metrics));

    let body_limit = DefaultBodyLimit::max(state.config.server.max_upload_bytes);
    let timeout = TimeoutLayer::new(state.config.request_timeout());

    // Compose the app
    Router::new()
        .nest("/v1", api_routes)
        .layer(body_limit)
        .layer(timeout)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use bookspace_common::{
        blob::InMemoryBlobStorage,
        config::DatabaseConfig,
        faces::{FaceAttributes, FaceRectangle, StaticFaceDetector},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn test_app() -> Router {
        let mut config = AppConfig::default();
        config.database = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            ..config.database
        };

        let db = DbPool::new(&config.database).await.unwrap();
        schema::create_tables(db.connection()).await.unwrap();

        let face = FaceAttributes {
            rectangle: FaceRectangle { top: 4, left: 8, width: 40, height: 40 },
            age: Some(29.0),
            gender: Some("female".to_string()),
            smile: Some(0.7),
            glasses: None,
            emotion: Some("happiness".to_string()),
        };
        let books = BookDataService::new(
            Arc::new(InMemoryBlobStorage::new("memory://covers")),
            Arc::new(StaticFaceDetector::new(vec![face])),
            config.enrichment.clone(),
        );

        create_router(AppState {
            config: Arc::new(config),
            db,
            books: Arc::new(books),
        })
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        app.clone().oneshot(request.body(body).unwrap()).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn create_user(app: &Router, name: &str) -> String {
        let response = send(
            app,
            Method::POST,
            "/v1/users",
            Some(json!({"user_name": name, "email": format!("{name}@bookspace.test")})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        json_body(response).await["id"].as_str().unwrap().to_string()
    }

    async fn create_book(app: &Router, owner: &str, title: &str) -> String {
        let response = send(
            app,
            Method::POST,
            "/v1/books",
            Some(json!({"title": title, "author": "Frank Herbert", "owner_id": owner})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        json_body(response).await["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app().await;
        let response = send(&app, Method::GET, "/v1/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));

        let response = send(&app, Method::GET, "/v1/ready", None).await;
        assert_eq!(json_body(response).await["status"], "ready");
    }

    #[tokio::test]
    async fn test_book_lifecycle_with_cover() {
        let app = test_app().await;
        let owner = create_user(&app, "paul").await;
        let book = create_book(&app, &owner, "Dune").await;

        let fetched = json_body(send(&app, Method::GET, &format!("/v1/books/{book}"), None).await).await;
        assert_eq!(fetched["title"], "Dune");
        assert_eq!(fetched["cover"]["status"], "not_uploaded");
        assert_eq!(fetched["face_analysis"], "skipped");

        let upload = Request::builder()
            .method(Method::PUT)
            .uri(format!("/v1/books/{book}/cover"))
            .header(header::CONTENT_TYPE, "image/png")
            .body(Body::from(vec![0x89, b'P', b'N', b'G']))
            .unwrap();
        let response = app.clone().oneshot(upload).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let url = json_body(response).await["url"].as_str().unwrap().to_string();
        assert!(url.starts_with("memory://covers/covers/"));

        let fetched = json_body(send(&app, Method::GET, &format!("/v1/books/{book}"), None).await).await;
        assert_eq!(fetched["cover"]["status"], "available");
        assert_eq!(fetched["cover"]["url"], url.as_str());
        assert_eq!(fetched["faces"].as_array().unwrap().len(), 1);

        let response = send(&app, Method::DELETE, &format!("/v1/books/{book}"), None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = send(&app, Method::GET, &format!("/v1/books/{book}"), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_cover_requires_image_content_type() {
        let app = test_app().await;
        let owner = create_user(&app, "jessica").await;
        let book = create_book(&app, &owner, "Dune").await;

        let upload = Request::builder()
            .method(Method::PUT)
            .uri(format!("/v1/books/{book}/cover"))
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("not an image"))
            .unwrap();
        let response = app.clone().oneshot(upload).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_classification_and_comments() {
        let app = test_app().await;
        let owner = create_user(&app, "leto").await;
        let book = create_book(&app, &owner, "Dune").await;

        let genre = json_body(
            send(&app, Method::POST, "/v1/genres", Some(json!({"name": "Science Fiction"}))).await,
        )
        .await["id"]
            .as_str()
            .unwrap()
            .to_string();

        let uri = format!("/v1/books/{book}/genres/{genre}");
        assert_eq!(send(&app, Method::POST, &uri, None).await.status(), StatusCode::CREATED);
        assert_eq!(send(&app, Method::POST, &uri, None).await.status(), StatusCode::CONFLICT);

        let listed = json_body(send(&app, Method::GET, &format!("/v1/genres/{genre}/books"), None).await).await;
        assert_eq!(listed[0]["title"], "Dune");

        let response = send(
            &app,
            Method::POST,
            &format!("/v1/books/{book}/comments"),
            Some(json!({"user_id": owner, "content": "A classic"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let fetched = json_body(send(&app, Method::GET, &format!("/v1/books/{book}"), None).await).await;
        assert_eq!(fetched["genres"][0]["name"], "Science Fiction");
        assert_eq!(fetched["comments"][0]["content"], "A classic");
    }

    #[tokio::test]
    async fn test_validation_and_conflicts() {
        let app = test_app().await;
        create_user(&app, "stilgar").await;

        let response = send(
            &app,
            Method::POST,
            "/v1/users",
            Some(json!({"user_name": "stilgar", "email": "other@bookspace.test"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = send(
            &app,
            Method::POST,
            "/v1/users",
            Some(json!({"user_name": "chani", "email": "not-an-email"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            &app,
            Method::POST,
            "/v1/books",
            Some(json!({"title": "   ", "author": "Frank Herbert", "owner_id": "x"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            &app,
            Method::POST,
            "/v1/books",
            Some(json!({"title": "Dune", "author": "Frank Herbert", "owner_id": "ghost"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_missing_genre_is_not_found() {
        let app = test_app().await;
        let response = send(&app, Method::DELETE, "/v1/genres/nope", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
