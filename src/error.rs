//! HTTP error type shared by all handlers.
//!
//! Every failure is rendered as `{ "success": false, "error": ..., "details"?: ... }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::dictionary::DictionaryError;
use crate::email::MailError;
use crate::feedback::FeedbackError;
use crate::rewrite::RewriteError;
use crate::settings::SettingsError;
use crate::store::StoreError;
use crate::transcription::TranscriptionError;
use crate::upload::ChunkError;
use crate::users::{DenyReason, UserError};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{message}")]
    PayloadTooLarge {
        message: String,
        size_mb: f64,
        max_mb: f64,
    },
    #[error("{0}")]
    TooManyRequests(String),
    /// Upstream or storage failure; `message` is the short label, `details` the cause.
    #[error("{message}: {details}")]
    Internal { message: String, details: String },
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn internal(message: impl Into<String>, details: impl std::fmt::Display) -> Self {
        ApiError::Internal {
            message: message.into(),
            details: details.to_string(),
        }
    }

    /// Map a refused pre-check to its status.
    pub fn denied(reason: DenyReason) -> Self {
        let message = reason.to_string();
        match reason {
            DenyReason::UserNotFound => ApiError::Unauthorized(message),
            DenyReason::CreditLimitReached { .. } | DenyReason::InsufficientCredits { .. } => {
                ApiError::TooManyRequests(message)
            }
            DenyReason::DurationExceeded { .. } => ApiError::Forbidden(message),
            DenyReason::FileTooLarge { max_mb } => ApiError::PayloadTooLarge {
                message,
                size_mb: 0.0,
                max_mb: max_mb as f64,
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Internal { message, details } => {
                tracing::error!(status = status.as_u16(), error = %message, details = %details, "request failed");
                json!({ "success": false, "error": message, "details": details })
            }
            ApiError::PayloadTooLarge {
                message,
                size_mb,
                max_mb,
            } => {
                let mut body = json!({ "success": false, "error": message, "maxSize": max_mb });
                if size_mb > 0.0 {
                    body["fileSize"] = json!(size_mb);
                }
                body
            }
            other => {
                tracing::debug!(status = status.as_u16(), error = %other, "request rejected");
                json!({ "success": false, "error": other.to_string() })
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::internal("Storage error", e)
    }
}

impl From<UserError> for ApiError {
    fn from(e: UserError) -> Self {
        match e {
            UserError::NotFound(_) => ApiError::NotFound(e.to_string()),
            UserError::AlreadyExists(_) => ApiError::BadRequest(e.to_string()),
            UserError::Protected => ApiError::Forbidden(e.to_string()),
            UserError::PasswordTooShort | UserError::Empty(_) => ApiError::BadRequest(e.to_string()),
            UserError::Store(e) => e.into(),
        }
    }
}

impl From<DictionaryError> for ApiError {
    fn from(e: DictionaryError) -> Self {
        match e {
            DictionaryError::DictionaryNotFound(_) | DictionaryError::TermNotFound(_) => {
                ApiError::NotFound(e.to_string())
            }
            DictionaryError::Invalid(_) => ApiError::BadRequest(e.to_string()),
            DictionaryError::Store(e) => e.into(),
        }
    }
}

impl From<FeedbackError> for ApiError {
    fn from(e: FeedbackError) -> Self {
        match e {
            FeedbackError::MissingMessage | FeedbackError::InvalidKind => {
                ApiError::BadRequest(e.to_string())
            }
            FeedbackError::Storage(e) => e.into(),
        }
    }
}

impl From<SettingsError> for ApiError {
    fn from(e: SettingsError) -> Self {
        match e {
            SettingsError::Invalid(message) => ApiError::BadRequest(message),
            other => ApiError::internal("Settings storage failed", other),
        }
    }
}

impl From<TranscriptionError> for ApiError {
    fn from(e: TranscriptionError) -> Self {
        match e {
            TranscriptionError::EmptyAudio => ApiError::BadRequest(e.to_string()),
            other => ApiError::internal("Transcription failed", other),
        }
    }
}

impl From<RewriteError> for ApiError {
    fn from(e: RewriteError) -> Self {
        ApiError::internal("Rewrite failed", e)
    }
}

impl From<ChunkError> for ApiError {
    fn from(e: ChunkError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<MailError> for ApiError {
    fn from(e: MailError) -> Self {
        match e {
            MailError::InvalidAddress { .. } => ApiError::BadRequest(e.to_string()),
            other => ApiError::internal("Email delivery failed", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deny_reason_status() {
        assert_eq!(
            ApiError::denied(DenyReason::UserNotFound).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::denied(DenyReason::CreditLimitReached { limit: 10 }).status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::denied(DenyReason::DurationExceeded { max_minutes: 30 }).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::denied(DenyReason::FileTooLarge { max_mb: 25 }).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn test_library_errors_map_to_client_errors() {
        assert_eq!(
            ApiError::from(UserError::Protected).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(DictionaryError::TermNotFound("t".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(SettingsError::Invalid("bad".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(TranscriptionError::MissingApiKey).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(ChunkError::TooManyChunks { total: 1 << 40, max: 10_000 }).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
