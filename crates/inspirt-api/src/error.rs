use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use inspirt_providers::ProviderError;

/// Error taxonomy for the HTTP surface. Every variant carries a short
/// caller-facing message; nothing is retried server-side.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Auth(&'static str),

    #[error("Admin access required")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Insufficient credits")]
    QuotaExceeded,

    /// Fatal upstream failure (text generation, voice creation). A failed
    /// speech-synthesis call inside a chat turn never reaches this — it
    /// degrades instead.
    #[error("{0}")]
    Upstream(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::QuotaExceeded => StatusCode::PAYMENT_REQUIRED,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        Self::Upstream(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            // Storage details stay in the logs, not in responses.
            Self::Internal(err) => {
                error!("Internal error: {:#}", err);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Flatten a `spawn_blocking` join result into an `ApiError`.
pub fn join_blocking<T>(
    result: Result<Result<T, ApiError>, tokio::task::JoinError>,
) -> Result<T, ApiError> {
    match result {
        Ok(inner) => inner,
        Err(e) => Err(ApiError::Internal(anyhow::anyhow!(
            "blocking task panicked: {}",
            e
        ))),
    }
}
