use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use bytes::Bytes;
use serde_json::Value;

/// Failures surfaced to gateway clients. Every variant renders as a JSON body
/// with at least an `error` field.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{0}")]
    Validation(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("backend responded with {status}")]
    Backend { status: StatusCode, body: Bytes },

    #[error("Invalid backend response: {0}")]
    InvalidBackendResponse(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::BackendUnavailable(_) | GatewayError::InvalidBackendResponse(_) => {
                StatusCode::BAD_GATEWAY
            }
            GatewayError::Backend { status, .. } => *status,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::BackendUnavailable(err.to_string())
    }
}

/// Body for a backend error status: the backend's own JSON when it already
/// names an error, otherwise a wrapper around whatever text it sent.
pub fn backend_error_body(status: StatusCode, body: &[u8]) -> Value {
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        if value.get("error").is_some() {
            return value;
        }
    }

    let text = String::from_utf8_lossy(body).trim().to_string();
    let message = if text.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Backend request failed")
            .to_string()
    } else {
        text
    };
    serde_json::json!({
        "error": message,
        "status": status.as_u16(),
    })
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            GatewayError::Backend { status, body } => backend_error_body(status, &body),
            other => serde_json::json!({
                "error": other.to_string(),
                "status": status.as_u16(),
            }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn backend_json_errors_pass_through() {
        let body = backend_error_body(StatusCode::NOT_FOUND, br#"{"error":"session not found"}"#);
        assert_eq!(body, json!({"error": "session not found"}));
    }

    #[test]
    fn plain_backend_errors_are_wrapped() {
        let body = backend_error_body(StatusCode::CONFLICT, b"already exited\n");
        assert_eq!(body, json!({"error": "already exited", "status": 409}));

        let body = backend_error_body(StatusCode::SERVICE_UNAVAILABLE, b"");
        assert_eq!(body["error"], "Service Unavailable");
    }

    #[test]
    fn statuses() {
        assert_eq!(
            GatewayError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::BackendUnavailable("refused".into()).status(),
            StatusCode::BAD_GATEWAY
        );
        let err = GatewayError::Backend {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            body: Bytes::new(),
        };
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
