use crate::repositories::RepositoryError;
use crate::services::{
    ConfirmationServiceError, ListingServiceError, PhotoStoreError, RegistrationServiceError,
};
use crate::validation::FieldErrors;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

// Type alias for Result with our AppError
pub type Result<T> = std::result::Result<T, AppError>;

pub const DUPLICATE_EMAIL_MESSAGE: &str = "This email is already registered.";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(FieldErrors),

    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Not found")]
    NotFound,

    #[error("Invalid stage transition: {0}")]
    InvalidStageTransition(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal server error")]
    InternalError,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "errors": errors })),
            )
                .into_response(),
            AppError::DuplicateEmail => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "errors": FieldErrors::single("email", DUPLICATE_EMAIL_MESSAGE) })),
            )
                .into_response(),
            AppError::NotFound => StatusCode::NOT_FOUND.into_response(),
            AppError::InvalidStageTransition(detail) => {
                tracing::info!("Rejected moderation: {}", detail);
                StatusCode::NOT_FOUND.into_response()
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                internal_error()
            }
            AppError::Storage(detail) => {
                tracing::error!("Storage error: {}", detail);
                internal_error()
            }
            AppError::InternalError => internal_error(),
        }
    }
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
        .into_response()
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Database(e) => AppError::Database(e),
            RepositoryError::NotFound => AppError::NotFound,
            RepositoryError::AlreadyExists => AppError::Storage(err.to_string()),
        }
    }
}

impl From<RegistrationServiceError> for AppError {
    fn from(err: RegistrationServiceError) -> Self {
        match err {
            RegistrationServiceError::DuplicateEmail => AppError::DuplicateEmail,
            RegistrationServiceError::RepositoryError(e) => e.into(),
        }
    }
}

impl From<ConfirmationServiceError> for AppError {
    fn from(err: ConfirmationServiceError) -> Self {
        match err {
            ConfirmationServiceError::NotFound => AppError::NotFound,
            ConfirmationServiceError::InvalidStageTransition { .. } => {
                AppError::InvalidStageTransition(err.to_string())
            }
            ConfirmationServiceError::MalformedToken
            | ConfirmationServiceError::InvalidOrExpiredToken => {
                AppError::Validation(FieldErrors::single("token", err.to_string()))
            }
            ConfirmationServiceError::RepositoryError(e) => e.into(),
        }
    }
}

impl From<ListingServiceError> for AppError {
    fn from(err: ListingServiceError) -> Self {
        match err {
            ListingServiceError::RepositoryError(e) => e.into(),
        }
    }
}

impl From<PhotoStoreError> for AppError {
    fn from(err: PhotoStoreError) -> Self {
        match err {
            PhotoStoreError::RepositoryError(e) => e.into(),
            other => AppError::Storage(other.to_string()),
        }
    }
}
