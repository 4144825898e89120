//! JSON extractor whose rejections use the service error envelope.
//!
//! Shape failures (not JSON, missing key, wrong JSON type) stop here with a
//! 422. Everything that parses is handed to the kernel, which reports
//! constraint failures in-band.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::Json;

use redline_kernel::sanitize_text;

use crate::error::ApiError;

pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(map_json_rejection(rejection)),
        }
    }
}

const REJECTION_MESSAGE: &str = "Invalid request body";
const REJECTION_DETAIL_LOG_LEN: usize = 100;

/// The response names the offending field but never echoes the serde text,
/// which can quote submitted values.
pub fn map_json_rejection(rejection: JsonRejection) -> ApiError {
    let body_text = rejection.body_text();
    tracing::debug!(
        status = %rejection.status(),
        detail = %sanitize_text(&body_text, REJECTION_DETAIL_LOG_LEN),
        "request body rejected"
    );
    let field = field_from_serde_message(&body_text).unwrap_or_else(|| "body".to_string());
    ApiError::validation(REJECTION_MESSAGE, Some(field))
}

fn field_from_serde_message(msg: &str) -> Option<String> {
    let named = ["missing field `", "unknown field `"].iter().find_map(|marker| {
        let start = msg.find(marker)? + marker.len();
        let rest = &msg[start..];
        rest.find('`').map(|end| rest[..end].to_string())
    });
    if named.is_some() {
        return named;
    }
    // Type errors carry the path as a prefix: "rating: invalid type: ...".
    let detail = msg.split_once("target type: ").map_or(msg, |(_, d)| d);
    [": invalid type", ": invalid value", ": invalid length"]
        .iter()
        .find_map(|marker| {
            let path = &detail[..detail.find(marker)?];
            (!path.is_empty() && !path.contains(char::is_whitespace)).then(|| path.to_string())
        })
}
