use axum::http::StatusCode;
use std::fmt::Display;

use crate::services::experiment_etl::EtlError;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<AppError> for (StatusCode, String) {
    fn from(err: AppError) -> Self {
        (err.status, err.message)
    }
}

pub fn internal_error(err: impl Display) -> (StatusCode, String) {
    tracing::error!(error = %err, "internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

/// Only a missing data locator is reported to the caller; every other failure is
/// logged and surfaced as a generic internal error.
pub fn map_etl_error(err: EtlError) -> (StatusCode, String) {
    match err {
        EtlError::NotFound(_) => {
            tracing::warn!(error = %err, "experiment data not found");
            AppError::not_found(err.to_string()).into()
        }
        EtlError::PathNotAllowed(_) => {
            tracing::warn!(error = %err, "experiment data path rejected");
            AppError::forbidden(err.to_string()).into()
        }
        EtlError::Sink(ref db) => {
            tracing::error!(error = %db, "derived summary sink error");
            AppError::internal("Internal server error").into()
        }
        other => internal_error(other),
    }
}
