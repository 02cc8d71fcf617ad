use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::resumes::router::{error_response, status_for};
use crate::workflows::resumes::ResumeServiceError;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Resume(ResumeServiceError),
}

impl AppError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        match self {
            AppError::Resume(err) => status_for(err.kind()),
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Resume(err) => write!(f, "resume error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Resume(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Resume(err) => error_response(err),
            other => {
                let body = Json(json!({ "error": other.to_string() }));
                (other.status_code(), body).into_response()
            }
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<ResumeServiceError> for AppError {
    fn from(value: ResumeServiceError) -> Self {
        Self::Resume(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::resumes::{AuditError, AuditStatus};
    use axum::http::StatusCode;

    #[test]
    fn resume_errors_keep_their_status() {
        let closed = AppError::from(ResumeServiceError::from(AuditError::AlreadyClosed {
            status: AuditStatus::Complete,
        }));
        assert_eq!(closed.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let config = AppError::from(ConfigError::InvalidPort);
        assert_eq!(config.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(config.to_string().starts_with("configuration error"));
    }
}
