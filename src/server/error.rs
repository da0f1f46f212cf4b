use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::pipeline::PipelineError;

/// Failure body returned to HTTP callers
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,

    pub error: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
}

impl ApiError {
    pub fn video_url_required() -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: "video_url_required",
            video_id: None,
            video_url: None,
        }
    }

    /// Map a pipeline failure to its status and short code; details stay in the logs
    pub fn from_pipeline(error: &PipelineError, video_url: &str) -> Self {
        let status = match error {
            PipelineError::InvalidReference => StatusCode::BAD_REQUEST,
            PipelineError::VideoUnavailable { .. } | PipelineError::NoTranscriptAvailable { .. } => {
                StatusCode::NOT_FOUND
            }
            PipelineError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        Self {
            status,
            error: error.code(),
            video_id: error.video_id().map(|id| id.to_string()),
            video_url: Some(video_url.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}
