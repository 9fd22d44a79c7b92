//! Face detection on cover images
//!
//! Provides the [`FaceDetector`] trait and its implementations:
//! - Azure Face REST API
//! - Static detector returning a fixed result (local runs, tests)
//! - Disabled detector that always reports the service as unavailable

use crate::config::FaceConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Bounding box of a detected face, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRectangle {
    pub top: u32,
    pub left: u32,
    pub width: u32,
    pub height: u32,
}

/// Attributes of one detected face
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceAttributes {
    pub rectangle: FaceRectangle,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,

    /// Smile intensity in `[0, 1]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smile: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub glasses: Option<String>,

    /// Highest scoring emotion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
}

/// Trait for face analysis services
#[async_trait]
pub trait FaceDetector: Send + Sync {
    /// Detect faces in an encoded image. An image without faces yields an empty list.
    async fn analyze(&self, image: &[u8]) -> Result<Vec<FaceAttributes>>;

    /// Detector name, for logs
    fn name(&self) -> &str;
}

fn unavailable(message: impl Into<String>) -> AppError {
    AppError::AnalysisUnavailable {
        message: message.into(),
    }
}

/// Azure Face API client
pub struct HttpFaceDetector {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    attributes: String,
}

impl HttpFaceDetector {
    /// Create a new client
    pub fn new(endpoint: &str, api_key: String, attributes: &[String], timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create face detection HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            attributes: attributes.join(","),
        })
    }

    fn detect_url(&self) -> String {
        format!(
            "{}/face/v1.0/detect?returnFaceId=false&returnFaceAttributes={}",
            self.endpoint, self.attributes
        )
    }
}

#[async_trait]
impl FaceDetector for HttpFaceDetector {
    async fn analyze(&self, image: &[u8]) -> Result<Vec<FaceAttributes>> {
        if image.is_empty() {
            return Err(unavailable("cannot analyze an empty image"));
        }

        let response = self
            .client
            .post(self.detect_url())
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .header("Content-Type", "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await
            .map_err(|e| unavailable(format!("detect request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(unavailable(format!("detect returned {}: {}", status, body)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| unavailable(format!("detect body: {}", e)))?;

        let faces = parse_detect_response(&body)?;
        debug!(faces = faces.len(), "Face detection complete");
        Ok(faces)
    }

    fn name(&self) -> &str {
        "azure-face"
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetectedFace {
    face_rectangle: FaceRectangle,
    #[serde(default)]
    face_attributes: Option<WireAttributes>,
}

#[derive(Deserialize)]
struct WireAttributes {
    age: Option<f32>,
    gender: Option<String>,
    smile: Option<f32>,
    glasses: Option<String>,
    #[serde(default)]
    emotion: HashMap<String, f32>,
}

/// Parse the body of a detect call into face attributes
pub fn parse_detect_response(body: &[u8]) -> Result<Vec<FaceAttributes>> {
    let faces: Vec<DetectedFace> = serde_json::from_slice(body)
        .map_err(|e| unavailable(format!("malformed detect response: {}", e)))?;

    Ok(faces
        .into_iter()
        .map(|face| {
            let attrs = face.face_attributes;
            FaceAttributes {
                rectangle: face.face_rectangle,
                age: attrs.as_ref().and_then(|a| a.age),
                gender: attrs.as_ref().and_then(|a| a.gender.clone()),
                smile: attrs.as_ref().and_then(|a| a.smile),
                glasses: attrs.as_ref().and_then(|a| a.glasses.clone()),
                emotion: attrs.as_ref().and_then(|a| dominant_emotion(&a.emotion)),
            }
        })
        .collect())
}

fn dominant_emotion(scores: &HashMap<String, f32>) -> Option<String> {
    scores
        .iter()
        .filter(|(_, score)| score.is_finite())
        .max_by(|a, b| a.1.total_cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(name, _)| name.clone())
}

/// Detector returning the same faces for every image
pub struct StaticFaceDetector {
    faces: Vec<FaceAttributes>,
}

impl StaticFaceDetector {
    pub fn new(faces: Vec<FaceAttributes>) -> Self {
        Self { faces }
    }
}

#[async_trait]
impl FaceDetector for StaticFaceDetector {
    async fn analyze(&self, _image: &[u8]) -> Result<Vec<FaceAttributes>> {
        Ok(self.faces.clone())
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Detector used when analysis is switched off
pub struct DisabledFaceDetector;

#[async_trait]
impl FaceDetector for DisabledFaceDetector {
    async fn analyze(&self, _image: &[u8]) -> Result<Vec<FaceAttributes>> {
        Err(unavailable("face detection is disabled"))
    }

    fn name(&self) -> &str {
        "disabled"
    }
}

/// Create a face detector based on configuration
pub fn create_face_detector(config: &FaceConfig) -> Result<Arc<dyn FaceDetector>> {
    match config.provider.as_str() {
        "azure" => {
            let endpoint = config.endpoint.as_deref().ok_or_else(|| AppError::Configuration {
                message: "face.endpoint is required for the azure provider".to_string(),
            })?;
            let api_key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
                message: "face.api_key is required for the azure provider".to_string(),
            })?;
            Ok(Arc::new(HttpFaceDetector::new(
                endpoint,
                api_key,
                &config.attributes,
                Duration::from_secs(config.timeout_secs),
            )?))
        }
        "static" => Ok(Arc::new(StaticFaceDetector::new(Vec::new()))),
        "disabled" => Ok(Arc::new(DisabledFaceDetector)),
        other => {
            tracing::warn!(provider = other, "Unknown face provider, disabling face detection");
            Ok(Arc::new(DisabledFaceDetector))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, http::StatusCode, routing::post, Router};
    use tokio::net::TcpListener;

    const DETECT_BODY: &str = r#"[
        {
            "faceRectangle": {"top": 131, "left": 177, "width": 162, "height": 162},
            "faceAttributes": {
                "age": 31.0,
                "gender": "female",
                "smile": 0.88,
                "glasses": "NoGlasses",
                "emotion": {"anger": 0.0, "happiness": 0.91, "neutral": 0.08, "sadness": 0.01}
            }
        },
        {
            "faceRectangle": {"top": 40, "left": 12, "width": 60, "height": 64}
        }
    ]"#;

    #[test]
    fn test_parse_detect_response() {
        let faces = parse_detect_response(DETECT_BODY.as_bytes()).unwrap();
        assert_eq!(faces.len(), 2);

        let first = &faces[0];
        assert_eq!(first.rectangle.width, 162);
        assert_eq!(first.gender.as_deref(), Some("female"));
        assert_eq!(first.emotion.as_deref(), Some("happiness"));
        assert_eq!(first.glasses.as_deref(), Some("NoGlasses"));

        let second = &faces[1];
        assert_eq!(second.rectangle.top, 40);
        assert!(second.age.is_none());
        assert!(second.emotion.is_none());
    }

    #[test]
    fn test_no_faces_is_empty_not_error() {
        assert!(parse_detect_response(b"[]").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_body_is_unavailable() {
        let err = parse_detect_response(b"{\"error\":{}}").unwrap_err();
        assert!(matches!(err, AppError::AnalysisUnavailable { .. }));
        assert!(err.is_transient());
    }

    #[test]
    fn test_detect_url_lists_attributes() {
        let detector = HttpFaceDetector::new(
            "https://faces.example.com/",
            "key".to_string(),
            &["age".to_string(), "emotion".to_string()],
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            detector.detect_url(),
            "https://faces.example.com/face/v1.0/detect?returnFaceId=false&returnFaceAttributes=age,emotion"
        );
    }

    #[tokio::test]
    async fn test_disabled_and_static_detectors() {
        let disabled = create_face_detector(&FaceConfig {
            provider: "disabled".to_string(),
            ..FaceConfig::default()
        })
        .unwrap();
        assert!(disabled.analyze(&[1, 2, 3]).await.is_err());

        let face = parse_detect_response(DETECT_BODY.as_bytes()).unwrap().remove(0);
        let fixed = StaticFaceDetector::new(vec![face.clone()]);
        assert_eq!(fixed.analyze(&[9]).await.unwrap(), vec![face]);
    }

    #[test]
    fn test_azure_provider_requires_credentials() {
        let config = FaceConfig {
            endpoint: Some("https://faces.example.com".to_string()),
            ..FaceConfig::default()
        };
        assert!(matches!(
            create_face_detector(&config),
            Err(AppError::Configuration { .. })
        ));
    }

    async fn serve(status: StatusCode, body: &'static str) -> String {
        let router = Router::new().route(
            "/face/v1.0/detect",
            post(move |headers: HeaderMap| async move {
                match headers.get("Ocp-Apim-Subscription-Key") {
                    Some(key) if key == "secret" => (status, body),
                    _ => (StatusCode::UNAUTHORIZED, ""),
                }
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{addr}")
    }

    fn detector(endpoint: &str, key: &str) -> HttpFaceDetector {
        HttpFaceDetector::new(
            endpoint,
            key.to_string(),
            &["age".to_string(), "emotion".to_string()],
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_http_detect_returns_faces() {
        let endpoint = serve(StatusCode::OK, DETECT_BODY).await;
        let faces = detector(&endpoint, "secret").analyze(&[0xff, 0xd8]).await.unwrap();
        assert_eq!(faces.len(), 2);
        assert_eq!(faces[0].emotion.as_deref(), Some("happiness"));
    }

    #[tokio::test]
    async fn test_http_detect_without_faces() {
        let endpoint = serve(StatusCode::OK, "[]").await;
        let faces = detector(&endpoint, "secret").analyze(&[0xff, 0xd8]).await.unwrap();
        assert!(faces.is_empty());
    }

    #[tokio::test]
    async fn test_http_detect_failures_are_unavailable() {
        let endpoint = serve(StatusCode::INTERNAL_SERVER_ERROR, "boom").await;
        let err = detector(&endpoint, "secret").analyze(&[1]).await.unwrap_err();
        assert!(matches!(err, AppError::AnalysisUnavailable { .. }));

        let endpoint = serve(StatusCode::OK, "[]").await;
        let err = detector(&endpoint, "wrong").analyze(&[1]).await.unwrap_err();
        assert!(matches!(err, AppError::AnalysisUnavailable { .. }));
    }
}
