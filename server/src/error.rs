//! # HTTP Error Mapping
//!
//! Every failed request gets the same JSON shape:
//!
//! ```json
//! { "error": { "kind": "ValidationError", "message": "…", "status": 400 } }
//! ```
//!
//! | Engine kind     | Status |
//! |-----------------|--------|
//! | NotFound        | 404    |
//! | Validation      | 400    |
//! | Unauthorized    | 401    |
//! | Forbidden       | 403    |
//! | AlreadyExists   | 409    |
//! | InvalidState    | 400    |
//! | Unavailable     | 503    |
//! | Internal        | 500    |
//!
//! Internal errors never leak their message. The original text rides along
//! in a response extension, and only the dev-mode layer
//! ([`expose_internal_detail`]) writes it back into the body as `detail`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use quill_engine::{Error, ErrorKind};

const INTERNAL_MESSAGE: &str = "Internal Server Error";

/// An engine error on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

/// The unredacted body of an internal error, for dev mode only.
#[derive(Debug, Clone)]
struct InternalDetail(ErrorBody);

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Validation | ErrorKind::InvalidState => StatusCode::BAD_REQUEST,
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::AlreadyExists => StatusCode::CONFLICT,
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = status_for(kind);

        if status.is_server_error() {
            tracing::error!(kind = kind.as_str(), error = %self.0, "request failed");
        } else {
            tracing::debug!(kind = kind.as_str(), error = %self.0, "request rejected");
        }

        let body = ErrorBody {
            kind: kind.as_str(),
            message: self.0.message().to_string(),
            status: status.as_u16(),
            detail: None,
        };

        if kind != ErrorKind::Internal {
            return (status, Json(ErrorEnvelope { error: body })).into_response();
        }

        let redacted = ErrorBody {
            message: INTERNAL_MESSAGE.to_string(),
            ..body.clone()
        };
        let detailed = ErrorBody {
            message: INTERNAL_MESSAGE.to_string(),
            detail: Some(body.message),
            ..body
        };
        let mut response = (status, Json(ErrorEnvelope { error: redacted })).into_response();
        response.extensions_mut().insert(InternalDetail(detailed));
        response
    }
}

/// Response mapper installed in dev mode: swaps a redacted internal error
/// body for the one carrying `detail`.
pub async fn expose_internal_detail(mut response: Response) -> Response {
    match response.extensions_mut().remove::<InternalDetail>() {
        Some(InternalDetail(body)) => {
            (response.status(), Json(ErrorEnvelope { error: body })).into_response()
        }
        None => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn client_errors_keep_their_message() {
        let response = ApiError(Error::validation("Insufficient payment amount")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["kind"], "ValidationError");
        assert_eq!(json["error"]["message"], "Insufficient payment amount");
        assert_eq!(json["error"]["status"], 400);
        assert!(json["error"].get("detail").is_none());
    }

    #[tokio::test]
    async fn internal_errors_are_redacted() {
        let response = ApiError(Error::Internal("sled error: disk on fire".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], INTERNAL_MESSAGE);
        assert!(json["error"].get("detail").is_none());
    }

    #[tokio::test]
    async fn dev_mode_shows_internal_detail() {
        let response = ApiError(Error::Internal("sled error: disk on fire".into())).into_response();
        let response = expose_internal_detail(response).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"]["detail"], "sled error: disk on fire");
    }

    #[test]
    fn status_table() {
        assert_eq!(status_for(ErrorKind::AlreadyExists), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::InvalidState), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::Unavailable), StatusCode::SERVICE_UNAVAILABLE);
    }
}
