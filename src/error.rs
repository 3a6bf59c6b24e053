//! Unified error handling with HTTP status mapping and a standardized
//! JSON error envelope. No internal detail (secrets, SQL, stack traces)
//! reaches a response body.

use crate::auth::AuthError;
use crate::database::error::DatabaseError;
use crate::payments::error::PaymentError;
use crate::services::notification::NotificationError;
use crate::services::reservation::ReservationWriteError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes for programmatic client handling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    #[serde(rename = "INVALID_ARGUMENT")]
    InvalidArgument,
    #[serde(rename = "UNAUTHENTICATED")]
    Unauthenticated,
    #[serde(rename = "UNAUTHORIZED")]
    Unauthorized,
    #[serde(rename = "INVALID_SIGNATURE")]
    InvalidSignature,
    #[serde(rename = "MALFORMED_PAYLOAD")]
    MalformedPayload,
    #[serde(rename = "UPSTREAM_ERROR")]
    UpstreamError,
    #[serde(rename = "PERSISTENCE_ERROR")]
    PersistenceError,
    #[serde(rename = "NOTIFICATION_ERROR")]
    NotificationError,
    #[serde(rename = "CONFIGURATION_ERROR")]
    ConfigurationError,
}

#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        message: String,
        field: Option<String>,
    },

    #[error("Unauthenticated: {message}")]
    Unauthenticated { message: String },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Invalid webhook signature: {message}")]
    InvalidSignature { message: String },

    #[error("Malformed payload: {message}")]
    MalformedPayload { message: String },

    #[error("Upstream failure: {message}")]
    Upstream { message: String, retryable: bool },

    #[error("Persistence failure: {message}")]
    Persistence { message: String },

    #[error("Notification failure: {message}")]
    Notification { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl AppError {
    pub fn invalid_argument(message: impl Into<String>, field: Option<&str>) -> Self {
        AppError::InvalidArgument {
            message: message.into(),
            field: field.map(|f| f.to_string()),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            AppError::Unauthorized { .. } => StatusCode::FORBIDDEN,
            AppError::InvalidSignature { .. } => StatusCode::BAD_REQUEST,
            AppError::MalformedPayload { .. } => StatusCode::BAD_REQUEST,
            AppError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            AppError::Persistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Notification { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            AppError::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            AppError::Unauthenticated { .. } => ErrorCode::Unauthenticated,
            AppError::Unauthorized { .. } => ErrorCode::Unauthorized,
            AppError::InvalidSignature { .. } => ErrorCode::InvalidSignature,
            AppError::MalformedPayload { .. } => ErrorCode::MalformedPayload,
            AppError::Upstream { .. } => ErrorCode::UpstreamError,
            AppError::Persistence { .. } => ErrorCode::PersistenceError,
            AppError::Notification { .. } => ErrorCode::NotificationError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
        }
    }

    /// User-facing message. Validation errors pass through; everything
    /// else is replaced with a generic description.
    pub fn user_message(&self) -> String {
        match self {
            AppError::InvalidArgument { message, .. } => message.clone(),
            AppError::Unauthenticated { .. } => "Authentication required".to_string(),
            AppError::Unauthorized { .. } => "Not allowed".to_string(),
            AppError::InvalidSignature { .. } => "Invalid webhook signature".to_string(),
            AppError::MalformedPayload { .. } => "Malformed payload".to_string(),
            AppError::Upstream { .. } => "Error creating payment".to_string(),
            AppError::Persistence { .. } => {
                "Service temporarily unavailable. Please try again later".to_string()
            }
            AppError::Notification { .. } => "Notification could not be delivered".to_string(),
            AppError::Configuration { .. } => {
                "Service temporarily unavailable. Please try again later".to_string()
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Upstream { retryable, .. } => *retryable,
            AppError::Persistence { .. } => true,
            _ => false,
        }
    }
}

/// Standardized error response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorCode,
    pub message: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl ErrorResponse {
    pub fn from_app_error(error: &AppError) -> Self {
        Self {
            error: error.error_code(),
            message: error.user_message(),
            timestamp: Utc::now().to_rfc3339(),
            retryable: Some(error.is_retryable()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorResponse::from_app_error(&self);
        (self.status_code(), Json(body)).into_response()
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::ValidationError { message, field } => {
                AppError::InvalidArgument { message, field }
            }
            PaymentError::Unauthenticated { message } => AppError::Unauthenticated { message },
            PaymentError::InvalidSignature { message } => AppError::InvalidSignature { message },
            PaymentError::MalformedPayload { message } => AppError::MalformedPayload { message },
            PaymentError::NetworkError { message } => AppError::Upstream {
                message,
                retryable: true,
            },
            PaymentError::RateLimitError { message, .. } => AppError::Upstream {
                message,
                retryable: true,
            },
            PaymentError::ProviderError {
                message, retryable, ..
            } => AppError::Upstream { message, retryable },
        }
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        AppError::Persistence {
            message: err.to_string(),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredential => AppError::Unauthenticated {
                message: "missing bearer credential".to_string(),
            },
            AuthError::InvalidCredential => AppError::Unauthorized {
                message: "credential rejected by identity provider".to_string(),
            },
            AuthError::ProviderUnavailable { message } => AppError::Upstream {
                message,
                retryable: true,
            },
        }
    }
}

impl From<NotificationError> for AppError {
    fn from(err: NotificationError) -> Self {
        AppError::Notification {
            message: err.to_string(),
        }
    }
}

impl From<ReservationWriteError> for AppError {
    fn from(err: ReservationWriteError) -> Self {
        match err {
            ReservationWriteError::InvalidMetadata(e) => e.into(),
            ReservationWriteError::Persistence(e) => e.into(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
