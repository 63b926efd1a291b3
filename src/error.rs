use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::store::StoreError;

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

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Store(e) => store_status(e),
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
        };

        (status, message).into_response()
    }
}

fn store_status(e: &StoreError) -> (StatusCode, String) {
    match e {
        StoreError::Denied => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
        StoreError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
        StoreError::Constraint(msg) => {
            tracing::debug!("Constraint violation: {}", msg);
            (StatusCode::CONFLICT, "Conflict".to_string())
        }
        StoreError::UnknownTable(_)
        | StoreError::UnknownColumn(_)
        | StoreError::InvalidValue(_) => (StatusCode::BAD_REQUEST, e.to_string()),
        StoreError::Pool(_) | StoreError::Sql(_) | StoreError::Decode(_) => {
            tracing::error!("Store error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
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
    fn unauthorized_returns_401() {
        assert_eq!(
            response_status(AppError::Unauthorized),
            StatusCode::UNAUTHORIZED
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
    fn internal_returns_500() {
        assert_eq!(
            response_status(AppError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn store_denied_returns_403() {
        assert_eq!(
            response_status(StoreError::Denied.into()),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn store_constraint_returns_409() {
        assert_eq!(
            response_status(StoreError::Constraint("UNIQUE".into()).into()),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn store_unknown_column_returns_400() {
        assert_eq!(
            response_status(StoreError::UnknownColumn("x".into()).into()),
            StatusCode::BAD_REQUEST
        );
    }
}
