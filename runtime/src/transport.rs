//! The I/O half of the host-does-IO split.
//!
//! A `Transport` executes one `HttpRequest` built by the core and returns the
//! response as plain data. Status codes are never treated as errors here;
//! interpreting them is the caller's business. No retries, and no timeout
//! beyond what the underlying client applies.

use async_trait::async_trait;
use loanguard_core::http::{FormPart, PartValue};
use loanguard_core::{HttpMethod, HttpRequest, HttpResponse, MultipartForm, RequestBody};
use reqwest::multipart::{Form, Part};
use tracing::debug;

use crate::error::TransportError;

/// Mockable transport seam
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform a single HTTP round trip.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Production transport backed by a pooled reqwest client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    inner: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let inner = reqwest::Client::builder().build()?;
        Ok(Self { inner })
    }

    pub fn with_client(inner: reqwest::Client) -> Self {
        Self { inner }
    }
}

fn method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

fn multipart(form: MultipartForm) -> Result<Form, TransportError> {
    let mut out = Form::new();
    for FormPart { name, value } in form.parts {
        out = match value {
            PartValue::Text(text) => out.text(name, text),
            PartValue::File {
                file_name,
                content_type,
                bytes,
            } => {
                let mut part = Part::bytes(bytes).file_name(file_name);
                if let Some(content_type) = content_type {
                    part = part
                        .mime_str(&content_type)
                        .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
                }
                out.part(name, part)
            }
        };
    }
    Ok(out)
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        debug!("HTTP {}: {}", request.method, request.url);

        let mut builder = self.inner.request(method(request.method), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            Some(RequestBody::Json(text)) => builder.body(text),
            Some(RequestBody::Multipart(form)) => builder.multipart(multipart(form)?),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
            .collect();
        let body = response.text().await?;

        debug!(status, bytes = body.len(), "HTTP response");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
