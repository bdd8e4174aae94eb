//! Stateless HTTP request builder and response decoder for the fraud API.
//!
//! # Design
//! `ApiClient` holds only a `base_url` and carries no mutable state between
//! calls. Each endpoint is split into a `build_*` method that produces an
//! `HttpRequest` and a parse step that consumes an `HttpResponse`. The runtime
//! executes the actual HTTP round-trip, keeping the core deterministic and
//! free of I/O dependencies.
//!
//! Only the upload endpoint interprets status codes. Everywhere else a non-2xx
//! response is decoded and returned like any other.

use serde::Serialize;

use crate::config::ApiConfig;
use crate::decode::Decoded;
use crate::error::{ApiError, UPLOAD_FAILED};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, MultipartForm, RequestBody};

pub const HEALTH_PATH: &str = "/";
pub const MOUSE_PATH: &str = "/api/mouse";
pub const KEYBOARD_PATH: &str = "/api/keyboard";
pub const FINGERPRINT_PATH: &str = "/api/fingerprint";
pub const UPLOAD_PATH: &str = "/api/upload";

/// Synchronous, stateless client for the fraud-analysis API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
        }
    }

    pub fn from_config(config: &ApiConfig) -> Self {
        Self::new(&config.base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for `path`: `base + path`, with a single `/` at the seam.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url.trim_end_matches('/'))
        } else {
            format!("{}{path}", self.base_url)
        }
    }

    /// Build a request for any path. A JSON content-type header is attached
    /// only when a body is present.
    pub fn build_request<B: Serialize + ?Sized>(
        &self,
        path: &str,
        method: HttpMethod,
        body: Option<&B>,
    ) -> Result<HttpRequest, ApiError> {
        let Some(body) = body else {
            return Ok(HttpRequest {
                method,
                url: self.url(path),
                headers: Vec::new(),
                body: None,
            });
        };
        let body = serde_json::to_string(body).map_err(|e| ApiError::Serialization(e.to_string()))?;
        Ok(HttpRequest {
            method,
            url: self.url(path),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Some(RequestBody::Json(body)),
        })
    }

    pub fn build_health(&self) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url: self.url(HEALTH_PATH),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn build_analyze_mouse<B: Serialize + ?Sized>(&self, features: &B) -> Result<HttpRequest, ApiError> {
        self.build_request(MOUSE_PATH, HttpMethod::Post, Some(features))
    }

    pub fn build_analyze_keyboard<B: Serialize + ?Sized>(&self, features: &B) -> Result<HttpRequest, ApiError> {
        self.build_request(KEYBOARD_PATH, HttpMethod::Post, Some(features))
    }

    pub fn build_analyze_fingerprint<B: Serialize + ?Sized>(
        &self,
        features: &B,
    ) -> Result<HttpRequest, ApiError> {
        self.build_request(FINGERPRINT_PATH, HttpMethod::Post, Some(features))
    }

    /// Multipart upload. No content-type header here; the transport owns the
    /// boundary.
    pub fn build_upload(&self, form: MultipartForm) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Post,
            url: self.url(UPLOAD_PATH),
            headers: Vec::new(),
            body: Some(RequestBody::Multipart(form)),
        }
    }

    /// Decode any response. Never fails and ignores the status code.
    pub fn parse_response(&self, response: HttpResponse) -> Decoded {
        Decoded::from_text(response.body)
    }

    /// Decode an upload response, rejecting non-2xx statuses with the
    /// server's `error` message.
    pub fn parse_upload(&self, response: HttpResponse) -> Result<Decoded, ApiError> {
        let status = response.status;
        let ok = response.is_success();
        let decoded = Decoded::from_text(response.body);
        if ok {
            return Ok(decoded);
        }
        let message = decoded.field_str("error").unwrap_or(UPLOAD_FAILED).to_string();
        Err(ApiError::Upload { status, message })
    }
}
