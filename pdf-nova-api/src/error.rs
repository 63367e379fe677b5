use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pdf_nova::NovaError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

/// Body of every error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable message shown by the front end
    pub detail: String,
}

/// Application-specific error types for the API
#[derive(Debug, Error)]
pub enum AppError {
    /// Errors raised by the document operations
    #[error(transparent)]
    Nova(#[from] NovaError),

    /// Malformed or truncated multipart body
    #[error("Invalid form data: {0}")]
    Multipart(#[from] MultipartError),

    /// A form value that failed to parse
    #[error("{0}")]
    BadField(String),

    /// A blocking task panicked or was cancelled
    #[error("Processing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Nova(e) if e.is_payload_too_large() => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Nova(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            AppError::Nova(_) | AppError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Multipart(e) => {
                // Body limit hits surface as multipart errors
                if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    StatusCode::PAYLOAD_TOO_LARGE
                } else {
                    StatusCode::BAD_REQUEST
                }
            }
            AppError::BadField(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        } else {
            warn!(%status, error = %self, "request rejected");
        }

        let error_response = ErrorResponse {
            detail: self.to_string(),
        };
        (status, Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf_nova::ExternalTool;

    #[test]
    fn test_status_mapping() {
        let status = |e: NovaError| AppError::from(e).status();
        assert_eq!(
            status(NovaError::InvalidInput("bad".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(NovaError::ToolUnavailable {
                tool: ExternalTool::Tesseract,
                message: "missing".into()
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(NovaError::PayloadTooLarge("big.pdf".into())),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            status(NovaError::OutputMissing("gone".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::BadField("chunk_size must be a number.".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_message_is_passed_through() {
        let error = AppError::from(NovaError::InvalidPdf("a.pdf".into()));
        assert_eq!(error.to_string(), "Invalid PDF: a.pdf");
    }
}
