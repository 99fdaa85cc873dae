use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::repositories::DatastoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("リクエスト形式エラー: {0}")]
    BadRequest(String),

    #[error("データストアエラー")]
    Datastore(#[from] DatastoreError),

    #[error("メール送信エラー: {0}")]
    Mail(String),

    #[error("内部エラー")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Datastore(DatastoreError::DuplicateEmail(email)) => (
                StatusCode::CONFLICT,
                format!("{email} is already associated with an account"),
            ),
            Self::Datastore(e) => {
                tracing::error!(error = ?e, "データストアエラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
            Self::Mail(e) => {
                tracing::error!(error = %e, "メール送信エラー");
                (
                    StatusCode::BAD_GATEWAY,
                    "Failed to send email".to_string(),
                )
            }
            Self::Internal(e) => {
                tracing::error!(error = ?e, "内部エラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
