use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lovewall_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Request body too large: {0}")]
    BodyTooLarge(String),
}

impl ApiError {
    pub fn multipart(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::BodyTooLarge(err.body_text())
        } else {
            ApiError::BadRequest(format!("Multipart error: {}", err.body_text()))
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Store(StoreError::Validation(_)) => {
                (StatusCode::BAD_REQUEST, "validation", self.to_string())
            }
            // Out-of-range positions have always been reported as 400.
            ApiError::Store(StoreError::NotFound { .. }) => {
                (StatusCode::BAD_REQUEST, "not_found", self.to_string())
            }
            ApiError::Store(StoreError::PayloadTooLarge { .. }) | ApiError::BodyTooLarge(_) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", self.to_string())
            }
            ApiError::Store(StoreError::StorageRead { .. })
            | ApiError::Store(StoreError::StorageWrite { .. }) => {
                tracing::error!(error = %self, "Storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage",
                    "Storage error, please try again later".to_string(),
                )
            }
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request", self.to_string()),
        };

        let body = serde_json::json!({
            "message": message,
            "error": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn store_errors_map_to_statuses() {
        assert_eq!(
            status_of(StoreError::Validation("empty".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(StoreError::NotFound { position: 3, len: 1 }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(StoreError::PayloadTooLarge { size: 11, max: 10 }),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            status_of(StoreError::StorageRead {
                path: "/tmp/loveData.json".into(),
                source: "bad json".into(),
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn bad_request_maps_to_400() {
        assert_eq!(
            status_of(ApiError::BadRequest("no file".into())),
            StatusCode::BAD_REQUEST
        );
    }
}
