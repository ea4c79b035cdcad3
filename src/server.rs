pub mod input; // Collaborator text-input route

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::config::ServerConfig;
use crate::error::ValidationError;
use crate::models::{AnalysisResult, ImageFile, Submission};
use crate::services::{AnalysisService, GeminiService, OpenFoodFactsClient};

/// Room for the text part and multipart framing on top of the image itself.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

pub struct AppState {
    pub analysis: Arc<AnalysisService>,
    pub max_image_bytes: usize,
}

impl AppState {
    /// Wires the live Gemini and OpenFoodFacts collaborators.
    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        let gemini = GeminiService::new(
            config.google_api_key.clone(),
            config.gemini_base_url.clone(),
            config.gemini_model.clone(),
        )?;
        let catalog = OpenFoodFactsClient::new(config.openfoodfacts_url.clone())?;

        Ok(Self {
            analysis: Arc::new(AnalysisService::new(
                Arc::new(gemini),
                Arc::new(catalog),
                config.precedence,
            )),
            max_image_bytes: config.max_image_bytes,
        })
    }
}

/// Every error leaves the server as `{success: false, message}`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("❌ Request failed: {}", self);
        } else {
            log::warn!("⚠️ Request rejected ({}): {}", status, self);
        }

        (status, Json(json!({ "success": false, "message": self.to_string() }))).into_response()
    }
}

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.max_image_bytes + FORM_OVERHEAD_BYTES;
    let state = Arc::new(state);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/analyze", post(analyze_handler))
        .route("/api/input/text", post(input::text_input_handler))
        .fallback(not_found)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
}

/// A body cut off by the size limit means the upload was too big.
fn upload_error(e: MultipartError, max_image_bytes: usize, what: &str) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ValidationError::ImageTooLarge { max: max_image_bytes }.into()
    } else {
        ApiError::BadRequest(format!("Invalid {}: {}", what, e.body_text()))
    }
}

/// Reads the `product_name` and `image` parts; other fields are ignored.
async fn read_submission(mut multipart: Multipart, max_image_bytes: usize) -> Result<Submission, ApiError> {
    let mut product_name = None;
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| upload_error(e, max_image_bytes, "multipart body"))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("product_name") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| upload_error(e, max_image_bytes, "product_name"))?;
                product_name = Some(text);
            }
            Some("image") => {
                let file_name = field.file_name().unwrap_or("image.jpg").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| upload_error(e, max_image_bytes, "image upload"))?;

                // Browsers post an empty file part when nothing was picked.
                if bytes.is_empty() {
                    continue;
                }
                if bytes.len() > max_image_bytes {
                    return Err(ValidationError::ImageTooLarge { max: max_image_bytes }.into());
                }

                log::debug!("📸 Received image {} ({} bytes)", file_name, bytes.len());
                image = Some(ImageFile::new(file_name, content_type.as_deref(), bytes.to_vec()));
            }
            other => {
                log::debug!("Ignoring multipart field {:?}", other);
            }
        }
    }

    Ok(Submission::new(product_name, image))
}

async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalysisResult>, ApiError> {
    let multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let submission = read_submission(multipart, state.max_image_bytes).await?;

    let result = state.analysis.analyze(&submission).await?;
    Ok(Json(result))
}

async fn root_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "OK", "message": "API is running" }))
}

async fn health_check() -> &'static str {
    "OK"
}

async fn not_found(uri: axum::http::Uri) -> ApiError {
    ApiError::NotFound(format!("Route {} not found", uri.path()))
}
