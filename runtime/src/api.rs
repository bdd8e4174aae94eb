//! Async request client: core request building plus a `Transport`.
//!
//! Every call is a single round trip with no retry. Long-lived callers can
//! pass a `CancellationToken`; cancelling it drops the in-flight future and
//! resolves the call with `ClientError::Cancelled`.

use std::future::Future;
use std::sync::Arc;

use loanguard_core::{ApiClient, ApiConfig, Decoded, HttpMethod, HttpRequest, HttpResponse, MultipartForm};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ClientError, Result, TransportError};
use crate::transport::{ReqwestTransport, Transport};

/// Resolve `fut`, or `ClientError::Cancelled` once `cancel` fires.
pub async fn cancellable<T>(cancel: &CancellationToken, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ClientError::Cancelled),
        result = fut => result,
    }
}

#[derive(Clone)]
pub struct Api {
    client: ApiClient,
    transport: Arc<dyn Transport>,
}

impl Api {
    pub fn new(client: ApiClient, transport: Arc<dyn Transport>) -> Self {
        Self { client, transport }
    }

    /// Client for `config.base_url` over a fresh reqwest transport.
    pub fn from_config(config: &ApiConfig) -> std::result::Result<Self, TransportError> {
        Ok(Self::new(ApiClient::from_config(config), Arc::new(ReqwestTransport::new()?)))
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Generic round trip. The status code is not inspected; the body is
    /// returned as JSON when it parses, otherwise as the raw text.
    pub async fn request<B: Serialize + ?Sized + Sync>(
        &self,
        path: &str,
        method: HttpMethod,
        body: Option<&B>,
    ) -> Result<Decoded> {
        let request = self.client.build_request(path, method, body)?;
        let response = self.execute(request).await?;
        Ok(self.client.parse_response(response))
    }

    pub async fn request_with_cancel<B: Serialize + ?Sized + Sync>(
        &self,
        path: &str,
        method: HttpMethod,
        body: Option<&B>,
        cancel: &CancellationToken,
    ) -> Result<Decoded> {
        cancellable(cancel, self.request(path, method, body)).await
    }

    pub async fn health(&self) -> Result<Decoded> {
        let response = self.execute(self.client.build_health()).await?;
        Ok(self.client.parse_response(response))
    }

    pub async fn analyze_mouse<B: Serialize + ?Sized + Sync>(&self, features: &B) -> Result<Decoded> {
        let request = self.client.build_analyze_mouse(features)?;
        Ok(self.client.parse_response(self.execute(request).await?))
    }

    pub async fn analyze_keyboard<B: Serialize + ?Sized + Sync>(&self, features: &B) -> Result<Decoded> {
        let request = self.client.build_analyze_keyboard(features)?;
        Ok(self.client.parse_response(self.execute(request).await?))
    }

    pub async fn analyze_fingerprint<B: Serialize + ?Sized + Sync>(&self, features: &B) -> Result<Decoded> {
        let request = self.client.build_analyze_fingerprint(features)?;
        Ok(self.client.parse_response(self.execute(request).await?))
    }

    /// Multipart upload. Unlike the other endpoints, a non-2xx status fails
    /// with the server's `error` message.
    pub async fn upload(&self, form: MultipartForm) -> Result<Decoded> {
        let response = self.execute(self.client.build_upload(form)).await?;
        Ok(self.client.parse_upload(response)?)
    }

    pub async fn upload_with_cancel(&self, form: MultipartForm, cancel: &CancellationToken) -> Result<Decoded> {
        cancellable(cancel, self.upload(form)).await
    }

    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let (method, url) = (request.method, request.url.clone());
        match self.transport.execute(request).await {
            Ok(response) => Ok(response),
            Err(e) => {
                debug!(%method, %url, error = %e, "request failed");
                Err(ClientError::Network(e))
            }
        }
    }
}

impl std::fmt::Debug for Api {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Api").field("client", &self.client).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use loanguard_core::RequestBody;
    use parking_lot::Mutex;
    use serde_json::json;

    /// Records every request and replays a fixed response.
    struct Canned {
        status: u16,
        body: &'static str,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl Canned {
        fn new(status: u16, body: &'static str) -> Arc<Self> {
            Arc::new(Self {
                status,
                body,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Transport for Canned {
        async fn execute(&self, request: HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
            self.seen.lock().push(request);
            Ok(HttpResponse::new(self.status, self.body))
        }
    }

    struct Refused;

    #[async_trait]
    impl Transport for Refused {
        async fn execute(&self, _request: HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
            Err(TransportError::Unavailable("connection refused".to_string()))
        }
    }

    /// Never answers.
    struct Hang;

    #[async_trait]
    impl Transport for Hang {
        async fn execute(&self, _request: HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
            std::future::pending().await
        }
    }

    fn api(transport: Arc<dyn Transport>) -> Api {
        Api::new(ApiClient::new("http://localhost:5000"), transport)
    }

    #[tokio::test]
    async fn analyze_mouse_sends_exact_json_body() {
        let transport = Canned::new(200, r#"{"verdict":"human"}"#);
        let features = json!({"x": 0.1, "y": 0.2, "dx": 1.0, "dy": 0.5});

        let decoded = api(transport.clone()).analyze_mouse(&features).await.unwrap();
        assert_eq!(decoded.field_str("verdict"), Some("human"));

        let seen = transport.seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method, HttpMethod::Post);
        assert_eq!(seen[0].url, "http://localhost:5000/api/mouse");
        assert_eq!(seen[0].header("content-type"), Some("application/json"));
        assert_eq!(
            seen[0].body,
            Some(RequestBody::Json(serde_json::to_string(&features).unwrap()))
        );
    }

    #[tokio::test]
    async fn request_without_body_sends_no_headers() {
        let transport = Canned::new(200, "{}");
        api(transport.clone())
            .request::<serde_json::Value>("/", HttpMethod::Get, None)
            .await
            .unwrap();

        let seen = transport.seen.lock();
        assert!(seen[0].headers.is_empty());
        assert!(seen[0].body.is_none());
    }

    #[tokio::test]
    async fn non_2xx_json_is_returned_as_data() {
        let transport = Canned::new(503, r#"{"error":"model warming up"}"#);
        let decoded = api(transport).analyze_keyboard(&json!({"h": 0.1})).await.unwrap();
        assert_eq!(decoded.field_str("error"), Some("model warming up"));
    }

    #[tokio::test]
    async fn non_json_is_returned_raw() {
        let transport = Canned::new(200, "Service Unavailable");
        let decoded = api(transport).health().await.unwrap();
        assert_eq!(decoded, Decoded::Raw("Service Unavailable".to_string()));
    }

    #[tokio::test]
    async fn upload_rejection_carries_server_message() {
        let transport = Canned::new(400, r#"{"error":"bad file"}"#);
        let form = MultipartForm::new().file("files", "x.exe", None, vec![0x4d, 0x5a]);
        let err = api(transport).upload(form).await.unwrap_err();
        assert_eq!(err.to_string(), "bad file");
    }

    #[tokio::test]
    async fn upload_rejection_without_message_is_generic() {
        let transport = Canned::new(500, "{}");
        let err = api(transport).upload(MultipartForm::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "Upload failed");
    }

    #[tokio::test]
    async fn transport_failure_is_network_error() {
        let err = api(Arc::new(Refused)).health().await.unwrap_err();
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn cancelled_token_aborts_pending_request() {
        let cancel = CancellationToken::new();
        let api = api(Arc::new(Hang));
        let pending = api.request_with_cancel::<serde_json::Value>("/", HttpMethod::Get, None, &cancel);
        cancel.cancel();
        assert!(pending.await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn cancellable_passes_results_through() {
        let cancel = CancellationToken::new();
        let api = api(Canned::new(200, r#"{"message":"up"}"#));
        let decoded = cancellable(&cancel, api.health()).await.unwrap();
        assert_eq!(decoded.field_str("message"), Some("up"));
    }
}
