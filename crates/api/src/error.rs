use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use snapshot_publisher_core::{ErrorCode, PublisherError};

/// API error rendered as the `{status: "error", error_code, error_msg}` envelope.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Publisher(#[from] PublisherError),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, ErrorCode) {
        match self {
            ApiError::Publisher(err) => {
                let status = match err {
                    PublisherError::NotFound { .. } => StatusCode::NOT_FOUND,
                    PublisherError::IllegalState(_) => StatusCode::CONFLICT,
                    PublisherError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                    PublisherError::Dependency(_) => StatusCode::BAD_GATEWAY,
                };
                (status, err.code())
            }
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, ErrorCode::ValidationError),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = match &self {
            ApiError::Publisher(PublisherError::Dependency(detail)) => {
                tracing::error!("Dependency error: {detail}");
                "the document store is unavailable".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "status": "error",
            "error_code": code.as_str(),
            "error_msg": message,
        });

        (status, Json(body)).into_response()
    }
}

/// Convenience type alias for route handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_taxonomy_to_status() {
        let cases = [
            (PublisherError::no_live_release("s1"), StatusCode::NOT_FOUND),
            (
                PublisherError::IllegalState("release is live".into()),
                StatusCode::CONFLICT,
            ),
            (
                PublisherError::validation("publish_datetime", "in the past"),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                PublisherError::Dependency("pool timed out".into()),
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
        assert_eq!(
            ApiError::BadRequest("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }
}
