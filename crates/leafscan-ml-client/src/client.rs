//! Inference service HTTP client.

use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use leafscan_models::{InferenceResult, ModelId};
use metrics::{counter, histogram};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::{debug, warn};

use crate::backend::InferenceBackend;
use crate::error::{MlError, MlResult};

/// Placeholder used when no API key is configured.
pub const PLACEHOLDER_API_KEY: &str = "YOUR_API_KEY";

const DEFAULT_API_URL: &str = "https://serverless.roboflow.com";

const INFERENCE_REQUESTS_TOTAL: &str = "leafscan_inference_requests_total";
const INFERENCE_DURATION_SECONDS: &str = "leafscan_inference_duration_seconds";

/// Configuration for the inference client.
#[derive(Clone)]
pub struct InferenceConfig {
    /// Base URL of the inference service
    pub api_url: String,
    /// API key sent with every call
    pub api_key: String,
    /// Request timeout; `None` keeps the transport default
    pub timeout: Option<Duration>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: PLACEHOLDER_API_KEY.to_string(),
            timeout: None,
        }
    }
}

impl fmt::Debug for InferenceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl InferenceConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            api_url: std::env::var("INFERENCE_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            api_key: std::env::var("ROBOFLOW_API_KEY")
                .unwrap_or_else(|_| PLACEHOLDER_API_KEY.to_string()),
            timeout: std::env::var("INFERENCE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs),
        }
    }

    /// Whether the API key is still the placeholder.
    pub fn has_placeholder_key(&self) -> bool {
        self.api_key == PLACEHOLDER_API_KEY
    }

    fn model_url(&self, model: &ModelId) -> String {
        format!("{}/{}", self.api_url.trim_end_matches('/'), model)
    }
}

/// Client for the hosted inference service.
pub struct InferenceClient {
    http: Client,
    config: InferenceConfig,
}

impl InferenceClient {
    /// Create a new inference client.
    pub fn new(config: InferenceConfig) -> MlResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(MlError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> MlResult<Self> {
        Self::new(InferenceConfig::from_env())
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Run `model` against an image held in memory.
    pub async fn infer_bytes(&self, image: &[u8], model: &ModelId) -> MlResult<InferenceResult> {
        let url = self.config.model_url(model);
        let start = Instant::now();

        debug!(model = %model, bytes = image.len(), "Sending inference request to {}", url);

        let outcome = self.send(&url, image).await;
        let elapsed = start.elapsed().as_secs_f64();

        let outcome_label = match &outcome {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        let labels = [
            ("model", model.to_string()),
            ("outcome", outcome_label.to_string()),
        ];
        counter!(INFERENCE_REQUESTS_TOTAL, &labels).increment(1);
        let model_label = [("model", model.to_string())];
        histogram!(INFERENCE_DURATION_SECONDS, &model_label).record(elapsed);

        if let Err(e) = &outcome {
            warn!(model = %model, "Inference request failed: {}", e);
        }

        outcome
    }

    /// Run `model` against an image file.
    pub async fn infer_path(&self, image_path: &Path, model: &ModelId) -> MlResult<InferenceResult> {
        let image = tokio::fs::read(image_path).await?;
        self.infer_bytes(&image, model).await
    }

    /// Check if the inference service answers at all.
    ///
    /// Any response below 500 counts as reachable; the root path of the
    /// hosted service is not a model and may legitimately return 4xx.
    pub async fn health_check(&self) -> MlResult<bool> {
        match self.http.get(&self.config.api_url).send().await {
            Ok(response) if !response.status().is_server_error() => Ok(true),
            Ok(response) => {
                warn!("Inference service health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Inference service health check error: {}", e);
                Ok(false)
            }
        }
    }

    async fn send(&self, url: &str, image: &[u8]) -> MlResult<InferenceResult> {
        let response = self
            .http
            .post(url)
            .query(&[("api_key", self.config.api_key.as_str())])
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(STANDARD.encode(image))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(MlError::RemoteStatus {
                status: status.as_u16(),
                body,
            });
        }

        let raw: serde_json::Value =
            serde_json::from_str(&body).map_err(|_| MlError::InvalidResponse(body))?;

        Ok(InferenceResult::from_value(raw))
    }
}

#[async_trait]
impl InferenceBackend for InferenceClient {
    async fn infer(&self, image_path: &Path, model: &ModelId) -> MlResult<InferenceResult> {
        self.infer_path(image_path, model).await
    }

    async fn health_check(&self) -> bool {
        InferenceClient::health_check(self).await.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> InferenceClient {
        InferenceClient::new(InferenceConfig {
            api_url: server.uri(),
            api_key: "test-key".to_string(),
            timeout: None,
        })
        .unwrap()
    }

    fn model(id: &str) -> ModelId {
        id.parse().unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = InferenceConfig::default();
        assert_eq!(config.api_url, "https://serverless.roboflow.com");
        assert!(config.has_placeholder_key());
        assert!(config.timeout.is_none());
    }

    #[test]
    fn test_config_debug_redacts_key() {
        let config = InferenceConfig {
            api_key: "secret-value".to_string(),
            ..Default::default()
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("secret-value"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_model_url_joins_without_double_slash() {
        let config = InferenceConfig {
            api_url: "http://localhost:9001/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.model_url(&model("tea-leaf-plant-diseases/1")),
            "http://localhost:9001/tea-leaf-plant-diseases/1"
        );
    }

    #[tokio::test]
    async fn test_infer_posts_base64_image_to_model_path() {
        let server = MockServer::start().await;
        let image = b"fake image bytes";

        Mock::given(method("POST"))
            .and(path("/cassava-model/1"))
            .and(query_param("api_key", "test-key"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string(STANDARD.encode(image)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "predictions": [{"class": "mosaic", "confidence": 0.93}],
                "top": "mosaic",
                "confidence": 0.93
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = client_for(&server)
            .infer_bytes(image, &model("cassava-model/1"))
            .await
            .unwrap();

        assert_eq!(result.predictions.len(), 1);
        assert_eq!(result.predictions[0].label, "mosaic");
        assert_eq!(result.raw["top"], "mosaic");
    }

    #[tokio::test]
    async fn test_infer_path_reads_file() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("temp_leaf.jpg");
        tokio::fs::write(&file, b"leaf").await.unwrap();

        Mock::given(method("POST"))
            .and(path("/rice-plant-leaf-disease-classification/1"))
            .and(body_string(STANDARD.encode(b"leaf")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"predictions": []})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result = InferenceBackend::infer(
            &client,
            &file,
            &model("rice-plant-leaf-disease-classification/1"),
        )
        .await
        .unwrap();
        assert!(result.predictions.is_empty());
    }

    #[tokio::test]
    async fn test_non_success_status_carries_remote_text() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden: invalid api key"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .infer_bytes(b"x", &model("tea-leaf-plant-diseases/1"))
            .await
            .unwrap_err();

        assert_eq!(err.remote_status(), Some(403));
        assert!(err.to_string().contains("Forbidden: invalid api key"));
    }

    #[tokio::test]
    async fn test_unparseable_body_is_invalid_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .infer_bytes(b"x", &model("tea-leaf-plant-diseases/1"))
            .await
            .unwrap_err();

        match err {
            MlError::InvalidResponse(body) => assert_eq!(body, "<html>oops</html>"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_failed_call_is_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .expect(1)
            .mount(&server)
            .await;

        let result = client_for(&server)
            .infer_bytes(b"x", &model("sugarcane-leaf-disease/2"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert!(client_for(&server).health_check().await.unwrap());
    }

    #[tokio::test]
    async fn test_health_check_unreachable() {
        let client = InferenceClient::new(InferenceConfig {
            api_url: "http://127.0.0.1:1".to_string(),
            api_key: "k".to_string(),
            timeout: Some(Duration::from_secs(2)),
        })
        .unwrap();

        assert!(!client.health_check().await.unwrap());
    }
}
