//! services/api/src/error.rs
//!
//! Defines the primary error type for the API service, and the mapping from
//! core errors onto the `(StatusCode, String)` pairs returned by handlers.

use crate::config::ConfigError;
use axum::http::StatusCode;
use classroom_core::lesson::ContentError;
use classroom_core::ports::PortError;
use classroom_core::quiz::QuizError;
use classroom_core::users::ValidationError;
use tracing::error;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// What every REST handler returns on failure.
pub type HandlerError = (StatusCode, String);

/// Maps a port failure to a response, logging anything that is not the
/// caller's fault.
pub fn port_failure(context: &str, e: PortError) -> HandlerError {
    match e {
        PortError::NotFound(what) => (StatusCode::NOT_FOUND, what),
        PortError::Conflict(what) => (StatusCode::CONFLICT, what),
        PortError::Unauthorized => (StatusCode::FORBIDDEN, "Not allowed".to_string()),
        PortError::Unexpected(cause) => {
            error!("{}: {}", context, cause);
            (StatusCode::INTERNAL_SERVER_ERROR, context.to_string())
        }
    }
}

pub fn content_failure(e: ContentError) -> HandlerError {
    (StatusCode::BAD_REQUEST, e.to_string())
}

pub fn quiz_failure(e: QuizError) -> HandlerError {
    let status = match e {
        QuizError::AttemptsExhausted { .. } | QuizError::AlreadyStarted => StatusCode::CONFLICT,
        QuizError::UnknownQuestion(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_REQUEST,
    };
    (status, e.to_string())
}

/// Field errors are returned as a JSON list so the client can show them inline.
pub fn validation_failure(errors: Vec<ValidationError>) -> HandlerError {
    let body = serde_json::to_string(&errors)
        .unwrap_or_else(|_| "Validation failed".to_string());
    (StatusCode::BAD_REQUEST, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_errors_map_to_status_codes() {
        assert_eq!(
            port_failure("Failed", PortError::NotFound("Quiz 1".into())).0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            port_failure("Failed", PortError::Conflict("dup".into())).0,
            StatusCode::CONFLICT
        );
        let (status, body) = port_failure("Failed to load quiz", PortError::Unexpected("boom".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Failed to load quiz");
    }

    #[test]
    fn validation_errors_are_listed_as_json() {
        let (status, body) = validation_failure(vec![ValidationError::new("title", "Title is required")]);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, r#"[{"field":"title","message":"Title is required"}]"#);
    }

    #[test]
    fn exhausted_attempts_are_a_conflict() {
        assert_eq!(
            quiz_failure(QuizError::AttemptsExhausted { allowed: 2 }).0,
            StatusCode::CONFLICT
        );
    }
}
