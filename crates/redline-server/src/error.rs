use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use redline_contracts::{ErrorBody, ErrorResponse};
use redline_kernel::UNKNOWN_ERROR_MESSAGE;

/// Non-200 failure rendered as the `{"error": {...}}` envelope.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    pub fn validation(message: impl Into<String>, field: Option<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            body: ErrorResponse {
                error: ErrorBody {
                    code: "validation_error".to_string(),
                    message: message.into(),
                    field,
                    details: None,
                },
            },
        }
    }

    pub fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorResponse {
                error: ErrorBody {
                    code: "internal_error".to_string(),
                    message: UNKNOWN_ERROR_MESSAGE.to_string(),
                    field: None,
                    details: None,
                },
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
