//! Application-scoped wiring: one `Api`, one `QueryCache`, one root
//! cancellation token. Created at startup, torn down at shutdown.

use std::sync::Arc;

use loanguard_core::{ApiClient, ApiConfig};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::api::Api;
use crate::error::TransportError;
use crate::query::{QueryCache, QueryConfig};
use crate::transport::{ReqwestTransport, Transport};

#[derive(Debug, Clone)]
pub struct AppContext {
    config: ApiConfig,
    api: Api,
    cache: QueryCache,
    cancel: CancellationToken,
}

impl AppContext {
    /// Empty cache plus a reqwest transport pointed at `config.base_url`.
    pub fn init(config: ApiConfig) -> Result<Self, TransportError> {
        let transport = Arc::new(ReqwestTransport::new()?);
        Ok(Self::with_transport(config, transport))
    }

    pub fn with_transport(config: ApiConfig, transport: Arc<dyn Transport>) -> Self {
        let cancel = CancellationToken::new();
        let api = Api::new(ApiClient::from_config(&config), transport);
        let cache = QueryCache::with_cancel(QueryConfig::from(&config), cancel.child_token());
        info!(base_url = %config.base_url, stale_secs = config.stale_time.as_secs(), "api context ready");
        Self {
            config,
            api,
            cache,
            cancel,
        }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn api(&self) -> &Api {
        &self.api
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Token for one consumer's requests. Cancelled by the consumer, or by
    /// `teardown` for everyone.
    pub fn child_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    pub fn is_torn_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Abort every pending request started through this context and clear
    /// the cache.
    pub fn teardown(&self) {
        self.cancel.cancel();
        self.cache.teardown();
        info!("api context torn down");
    }
}
