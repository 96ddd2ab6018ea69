use axum::{response::IntoResponse, Json};

/// Crate-wide error taxonomy. Conflict maps to 400 on the wire (uniqueness
/// and in-use violations are reported as bad requests, not 409) while staying
/// a distinct variant internally.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthenticated(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        let (status, message) = match &self {
            Self::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Conflict(msg) | Self::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Database(msg) | Self::Internal(msg) => {
                // Full detail stays in the server log; callers get a generic body.
                tracing::error!("request failed: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn status_codes_follow_taxonomy() {
        let cases = [
            (
                ApiError::Unauthenticated("no token".into()),
                StatusCode::UNAUTHORIZED,
            ),
            (ApiError::Forbidden("nope".into()), StatusCode::FORBIDDEN),
            (ApiError::NotFound("ticket".into()), StatusCode::NOT_FOUND),
            (
                ApiError::Conflict("department in use".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::InvalidInput("nothing to update".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Database("connection refused".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
