use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::response::Envelope;
use crate::thread::repository::RepositoryError;
use crate::thread::ThreadError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Integrity violation: {0}")]
    Integrity(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<RepositoryError> for AppError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::Database(e) => AppError::Pool(e),
            RepositoryError::Sql(e) => AppError::Database(e),
            RepositoryError::NotFound(_) => AppError::NotFound,
            RepositoryError::Invalid(msg) => AppError::BadRequest(msg),
            RepositoryError::Conflict(msg) => AppError::Conflict(msg),
            RepositoryError::Integrity(msg) => AppError::Integrity(msg),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        AppError::BadRequest(e.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(e: PathRejection) -> Self {
        AppError::BadRequest(e.body_text())
    }
}

impl From<ThreadError> for AppError {
    fn from(e: ThreadError) -> Self {
        match e {
            ThreadError::Validation(msg) => AppError::BadRequest(msg),
            ThreadError::Unauthorized => AppError::Unauthorized,
            ThreadError::NotFound => AppError::NotFound,
            ThreadError::Store(e) => e.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            AppError::Unauthorized => (StatusCode::FORBIDDEN, "Unauthorized".to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => {
                tracing::warn!("Conflict: {}", msg);
                (
                    StatusCode::CONFLICT,
                    "Busy, please try again".to_string(),
                )
            }
            AppError::Integrity(msg) => {
                tracing::error!("Integrity violation: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        Envelope::new(status, message).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn response_status(err: AppError) -> StatusCode {
        let response = err.into_response();
        response.status()
    }

    #[test]
    fn not_found_returns_404() {
        assert_eq!(response_status(AppError::NotFound), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unauthorized_returns_403() {
        assert_eq!(
            response_status(AppError::Unauthorized),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn bad_request_returns_400() {
        assert_eq!(
            response_status(AppError::BadRequest("oops".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn conflict_returns_409() {
        assert_eq!(
            response_status(AppError::Conflict("race".into())),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn integrity_and_internal_return_500() {
        assert_eq!(
            response_status(AppError::Integrity("partial".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            response_status(AppError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn thread_errors_map_to_envelope_codes() {
        let cases = [
            (ThreadError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (ThreadError::Unauthorized, StatusCode::FORBIDDEN),
            (ThreadError::NotFound, StatusCode::NOT_FOUND),
            (
                ThreadError::Store(RepositoryError::Conflict("pin".into())),
                StatusCode::CONFLICT,
            ),
            (
                ThreadError::Store(RepositoryError::Invalid("reply".into())),
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(response_status(AppError::from(err)), status);
        }
    }
}
