//! Application error types and their HTTP error envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::providers::SourceName;

/// Errors that reach the HTTP caller.
///
/// Individual provider failures never show up here; they are absorbed by the
/// cascade and only surface collectively as [`AppError::NotFound`].
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    InvalidRequest {
        message: String,
        param: Option<String>,
    },
    #[error("no provider resolved a playable url")]
    NotFound { attempted: Vec<SourceName> },
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Creates an `invalid_request_error` with status `400`.
    pub fn invalid_request(message: impl Into<String>, param: Option<&str>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
            param: param.map(ToOwned::to_owned),
        }
    }

    /// Creates the `404` returned once every applicable provider has failed.
    pub fn not_found(attempted: Vec<SourceName>) -> Self {
        Self::NotFound { attempted }
    }

    /// Creates a generic internal server error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

#[derive(Debug, Serialize)]
struct ErrorPayload {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
    #[serde(rename = "type")]
    error_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    param: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attempted_sources: Option<Vec<SourceName>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::InvalidRequest { message, param } => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    message,
                    error_type: "invalid_request_error",
                    code: Some("invalid_parameters"),
                    param,
                    attempted_sources: None,
                },
            ),
            AppError::NotFound { attempted } => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    message: "no provider resolved a playable url".to_string(),
                    error_type: "not_found_error",
                    code: Some("providers_exhausted"),
                    param: None,
                    attempted_sources: Some(attempted),
                },
            ),
            AppError::Internal(detail) => {
                error!(error = %detail, "request failed with internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        message: "internal server error".to_string(),
                        error_type: "server_error",
                        code: Some("internal_error"),
                        param: None,
                        attempted_sources: None,
                    },
                )
            }
        };

        (status, Json(ErrorPayload { error: body })).into_response()
    }
}
