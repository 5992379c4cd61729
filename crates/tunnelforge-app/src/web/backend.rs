//! HTTP client for the session backend.

use std::time::Duration;

use axum::http::{HeaderMap, Method, StatusCode};
use bytes::Bytes;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::headers::forwardable_request_headers;
use super::GatewayError;

const USER_AGENT: &str = concat!("tunnelforge-gateway/", env!("CARGO_PKG_VERSION"));

/// A buffered backend response.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl BackendResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn json(&self) -> Result<Value, GatewayError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| GatewayError::InvalidBackendResponse(e.to_string()))
    }

    /// Convert a non-success response into an error carrying the backend's
    /// status and body.
    pub fn error_for_status(self) -> Result<Self, GatewayError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(GatewayError::Backend {
                status: self.status,
                body: self.body,
            })
        }
    }
}

/// Re-serialize a JSON body so the backend always sees canonical JSON. Bodies
/// that do not parse are passed through untouched.
pub fn normalize_json(body: Bytes) -> Bytes {
    if body.is_empty() {
        return body;
    }
    match serde_json::from_slice::<Value>(&body) {
        Ok(value) => serde_json::to_vec(&value).map(Bytes::from).unwrap_or(body),
        Err(_) => body,
    }
}

#[derive(Clone)]
pub struct BackendClient {
    base: Url,
    http: reqwest::Client,
}

impl BackendClient {
    pub fn new(base: Url) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self { base, http })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url_for(&self, path_and_query: &str) -> Result<Url, GatewayError> {
        self.base
            .join(path_and_query)
            .map_err(|e| GatewayError::Validation(format!("invalid path {path_and_query}: {e}")))
    }

    /// Forward a request verbatim (after header filtering).
    pub async fn forward(
        &self,
        method: Method,
        path_and_query: &str,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<BackendResponse, GatewayError> {
        let url = self.url_for(path_and_query)?;
        let body = if matches!(method, Method::POST | Method::PUT | Method::PATCH) {
            normalize_json(body)
        } else {
            body
        };

        debug!(target: "gateway", method = %method, url = %url, "forwarding to backend");

        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .headers(forwardable_request_headers(headers));
        if !body.is_empty() {
            request = request.body(body);
        }

        let response = request.send().await.map_err(|err| {
            warn!(target: "gateway", method = %method, url = %url, error = %err, "backend unreachable");
            GatewayError::BackendUnavailable(err.to_string())
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(BackendResponse {
            status,
            headers,
            body,
        })
    }

    /// Send a JSON body, keeping the client's headers but forcing the
    /// content type.
    pub async fn send_json(
        &self,
        method: Method,
        path_and_query: &str,
        headers: &HeaderMap,
        payload: &Value,
    ) -> Result<BackendResponse, GatewayError> {
        let mut headers = headers.clone();
        headers.insert(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/json"),
        );
        headers.remove(axum::http::header::CONTENT_LENGTH);
        let body = serde_json::to_vec(payload)
            .map_err(|e| GatewayError::Validation(e.to_string()))?;
        self.forward(method, path_and_query, &headers, Bytes::from(body))
            .await
    }

    /// Write `data` to a session's input as if typed.
    pub async fn post_input(&self, session_id: &str, data: &str) -> Result<(), GatewayError> {
        let payload = serde_json::json!({ "type": "input", "data": data });
        let path = format!("/api/sessions/{session_id}/input");
        self.send_json(Method::POST, &path, &HeaderMap::new(), &payload)
            .await?
            .error_for_status()?;
        Ok(())
    }
}
