use aws_sdk_dynamodb::error::{BuildError, ProvideErrorMetadata, SdkError};
use condo_core::DomainError;
use lambda_http::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Config(&'static str),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Config(_) | ApiError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "InvalidRequest",
            ApiError::Unauthorized(_) => "AuthenticationFailed",
            ApiError::Forbidden(_) => "Forbidden",
            ApiError::NotFound(_) => "NotFound",
            ApiError::Conflict(_) => "Conflict",
            ApiError::Config(_) | ApiError::Backend(_) => "InternalError",
        }
    }

    pub fn to_response_body(&self) -> ErrorResponse {
        // Internal details stay in the logs.
        let message = match self {
            ApiError::Config(_) | ApiError::Backend(_) => "Unexpected error. Please try again".to_string(),
            other => other.to_string(),
        };
        ErrorResponse {
            error: self.code().to_string(),
            message,
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidTransition { .. } => ApiError::Conflict(err.to_string()),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::BadRequest(format!("Invalid request body: {}", err))
    }
}

impl From<BuildError> for ApiError {
    fn from(err: BuildError) -> Self {
        ApiError::Backend(format!("request build failed: {}", err))
    }
}

impl<E, R> From<SdkError<E, R>> for ApiError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    fn from(err: SdkError<E, R>) -> Self {
        match err.code() {
            Some("ConditionalCheckFailedException") | Some("TransactionCanceledException") => {
                ApiError::Conflict("The record was changed by someone else".to_string())
            }
            code => {
                tracing::error!("AWS call failed ({:?}): {:?}", code, err);
                ApiError::Backend(format!("{}", err))
            }
        }
    }
}
