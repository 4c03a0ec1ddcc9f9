use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::service::NoteError;

pub const NOTE_NOT_FOUND_MESSAGE: &str = "Note not found";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCode {
    InvalidInput,
    NotFound,
    Internal,
}

impl ErrorCode {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error body returned by every failing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(error: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn note_not_found() -> Self {
        Self::new(ErrorCode::NotFound, NOTE_NOT_FOUND_MESSAGE)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    pub fn status_code(&self) -> StatusCode {
        self.error.status_code()
    }
}

impl From<NoteError> for ApiError {
    fn from(err: NoteError) -> Self {
        match err {
            NoteError::InvalidInput(message) => ApiError::invalid_input(message),
            NoteError::NotFound(_) => ApiError::note_not_found(),
            // Store details stay in the server log.
            NoteError::Transport(_) => ApiError::internal("Database operation failed"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = %self.error, message = %self.message, "request failed");
        }
        (status, Json(self)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_errors_map_to_status_codes() {
        let cases = [
            (NoteError::InvalidInput("bad".into()), StatusCode::BAD_REQUEST),
            (NoteError::NotFound(7), StatusCode::NOT_FOUND),
            (
                NoteError::Transport("disk gone".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_code(), status);
        }
    }

    #[test]
    fn transport_details_are_not_leaked() {
        let api = ApiError::from(NoteError::Transport("/var/db locked".into()));
        assert!(!api.message.contains("/var/db"));
    }

    #[test]
    fn error_body_serialises_code_in_snake_case() -> anyhow::Result<()> {
        let body = serde_json::to_value(ApiError::note_not_found())?;
        assert_eq!(body["error"], "not_found");
        assert_eq!(body["message"], "Note not found");
        Ok(())
    }
}
