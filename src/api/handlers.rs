// ============================================================
// Layer 1 — HTTP Handlers
// ============================================================
// Thin adapters between axum and the inference service.
// Both operations are CPU-bound (model load, forward pass), so
// they run on tokio's blocking pool.
//
//   GET  /health  → 200 HealthReport, always
//   POST /predict → 200 PredictionResult
//                   500 { detail, kind } on any failure

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::application::inference_service::{HealthReport, HealthStatus};
use crate::domain::error::ClassifierError;
use crate::domain::prediction::PredictionResult;

/// Name of the multipart field carrying the image
pub const UPLOAD_FIELD: &str = "file";

// ─── Error body ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
    pub kind:   String,
}

/// Every predict failure maps to one 500 response.
#[derive(Debug)]
pub enum ApiError {
    Classifier(ClassifierError),
    /// The blocking task panicked or was cancelled
    Internal(String),
}

impl From<ClassifierError> for ApiError {
    fn from(e: ClassifierError) -> Self {
        Self::Classifier(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (message, kind) = match &self {
            Self::Classifier(e) => (e.to_string(), e.kind()),
            Self::Internal(msg) => (msg.clone(), "internal"),
        };
        tracing::warn!(kind, "Prediction failed: {}", message);

        let body = ErrorBody {
            detail: format!("Prediction failed: {message}"),
            kind:   kind.to_string(),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

// ─── Handlers ─────────────────────────────────────────────────────────────────
pub async fn health<B: Backend>(State(state): State<AppState<B>>) -> Json<HealthReport> {
    let service = state.service.clone();

    match tokio::task::spawn_blocking(move || service.health()).await {
        Ok(report) => Json(report),
        Err(e) => Json(HealthReport {
            status:      HealthStatus::Error,
            device:      state.service.device_name(),
            num_classes: None,
            labels:      state.labels,
            detail:      Some(format!("health check task failed: {e}")),
        }),
    }
}

pub async fn predict<B: Backend>(
    State(state): State<AppState<B>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictionResult>, ApiError> {
    let multipart = multipart.map_err(|e| ClassifierError::InvalidInput(e.body_text()))?;
    let bytes = read_upload(multipart).await?;
    tracing::debug!("Received upload of {} bytes", bytes.len());

    let service = state.service.clone();
    let result = tokio::task::spawn_blocking(move || service.predict(&bytes))
        .await
        .map_err(|e| ApiError::Internal(format!("prediction task failed: {e}")))??;

    Ok(Json(result))
}

/// Bytes of the first field named `file`; other fields are ignored.
async fn read_upload(mut multipart: Multipart) -> Result<Vec<u8>, ClassifierError> {
    let malformed = |e: axum::extract::multipart::MultipartError| {
        ClassifierError::InvalidInput(format!("malformed upload: {}", e.body_text()))
    };

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        if field.name() == Some(UPLOAD_FIELD) {
            let bytes = field.bytes().await.map_err(malformed)?;
            return Ok(bytes.to_vec());
        }
    }

    Err(ClassifierError::InvalidInput(format!(
        "missing multipart field '{UPLOAD_FIELD}'"
    )))
}
