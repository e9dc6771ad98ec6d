use super::mocks::StubSentimentModel;
use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use sentiment_service::{
    Result,
    classifier::SentimentModel,
    server::{self, handlers::AppState},
};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::fs;

/// Router backed by the keyword stub model
pub fn create_test_app() -> (Router, Arc<StubSentimentModel>) {
    let model = Arc::new(StubSentimentModel::new());
    let app = create_app_with_model(model.clone());
    (app, model)
}

pub fn create_app_with_model(model: Arc<dyn SentimentModel>) -> Router {
    server::router(AppState::new(model))
}

/// JSON POST to `/predict`
pub fn predict_request(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/predict")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Create a temporary directory for test files
pub fn create_temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// Create a test config YAML file
pub async fn create_test_config_file(dir: &TempDir, content: &str) -> Result<String> {
    let config_path = dir.path().join("config.yaml");
    fs::write(&config_path, content).await?;
    Ok(config_path.to_string_lossy().to_string())
}

/// Sample configuration YAML for testing
pub const SAMPLE_CONFIG_YAML: &str = r#"
server:
  host: "0.0.0.0"
  port: 8080
  logs:
    level: "debug"

model:
  id: "distilbert-base-uncased-finetuned-sst-2-english"
  revision: "main"
  device: "cpu"
  max_length: 128
"#;

/// Configuration pointing at a local artifact directory
pub const SAMPLE_CONFIG_WITH_PATH: &str = r#"
model:
  path: "/opt/models/sst2"
  device: "auto"
"#;

/// Invalid configuration YAML for testing error cases
pub const INVALID_CONFIG_YAML: &str = r#"
server:
  port: "not-a-number"
"#;
