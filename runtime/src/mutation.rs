//! Side-effecting write operations with observable state.
//!
//! A `Mutation` is triggered explicitly per user action. Invocations are
//! never cached or deduplicated; concurrent invocations race and whichever
//! finishes last writes the shared state. Nothing is retried.

use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use loanguard_core::Decoded;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::api::cancellable;
use crate::error::ClientError;
use crate::query::{QueryCache, QueryResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
    Idle,
    Pending,
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct MutationState {
    pub status: MutationStatus,
    pub data: Option<Decoded>,
    pub error: Option<Arc<ClientError>>,
}

impl MutationState {
    fn idle() -> Self {
        Self {
            status: MutationStatus::Idle,
            data: None,
            error: None,
        }
    }

    fn pending() -> Self {
        Self {
            status: MutationStatus::Pending,
            ..Self::idle()
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == MutationStatus::Pending
    }
}

type MutationFn<I> = Arc<dyn Fn(I) -> BoxFuture<'static, Result<Decoded, ClientError>> + Send + Sync>;

/// Write operation over input `I`. Clones share the same state.
pub struct Mutation<I> {
    fetcher: MutationFn<I>,
    state: Arc<watch::Sender<MutationState>>,
    invalidates: Option<(QueryCache, Vec<String>)>,
}

impl<I> Clone for Mutation<I> {
    fn clone(&self) -> Self {
        Self {
            fetcher: self.fetcher.clone(),
            state: self.state.clone(),
            invalidates: self.invalidates.clone(),
        }
    }
}

impl<I: Send + 'static> Mutation<I> {
    pub fn new<F, Fut>(fetcher: F) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Decoded, ClientError>> + Send + 'static,
    {
        let (tx, _) = watch::channel(MutationState::idle());
        Self {
            fetcher: Arc::new(move |input| fetcher(input).boxed()),
            state: Arc::new(tx),
            invalidates: None,
        }
    }

    /// Mark `keys` stale in `cache` after every successful invocation.
    pub fn invalidates<K: Into<String>>(mut self, cache: QueryCache, keys: impl IntoIterator<Item = K>) -> Self {
        self.invalidates = Some((cache, keys.into_iter().map(Into::into).collect()));
        self
    }

    pub async fn mutate(&self, input: I) -> QueryResult {
        self.state.send_replace(MutationState::pending());
        let result = (self.fetcher)(input).await.map_err(Arc::new);
        self.finish(result)
    }

    /// `mutate`, resolving with `ClientError::Cancelled` once `cancel` fires.
    pub async fn mutate_with_cancel(&self, input: I, cancel: &CancellationToken) -> QueryResult {
        self.state.send_replace(MutationState::pending());
        let result = cancellable(cancel, (self.fetcher)(input)).await.map_err(Arc::new);
        self.finish(result)
    }

    fn finish(&self, result: QueryResult) -> QueryResult {
        let state = match &result {
            Ok(data) => {
                if let Some((cache, keys)) = &self.invalidates {
                    for key in keys {
                        cache.invalidate(key);
                    }
                }
                MutationState {
                    status: MutationStatus::Success,
                    data: Some(data.clone()),
                    error: None,
                }
            }
            Err(e) => {
                warn!(error = %e, "mutation failed");
                MutationState {
                    status: MutationStatus::Error,
                    data: None,
                    error: Some(e.clone()),
                }
            }
        };
        self.state.send_replace(state);
        result
    }

    pub fn state(&self) -> MutationState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<MutationState> {
        self.state.subscribe()
    }

    pub fn reset(&self) {
        self.state.send_replace(MutationState::idle());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::query::QueryConfig;
    use loanguard_core::ApiError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn success_records_data() {
        let mutation = Mutation::new(|n: u32| async move { Ok(Decoded::Json(json!({ "n": n }))) });
        assert_eq!(mutation.state().status, MutationStatus::Idle);

        let data = mutation.mutate(7).await.unwrap();
        assert_eq!(data, Decoded::Json(json!({"n": 7})));

        let state = mutation.state();
        assert_eq!(state.status, MutationStatus::Success);
        assert_eq!(state.data, Some(data));
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn failure_is_surfaced_verbatim() {
        let mutation = Mutation::new(|_: ()| async {
            Err(ClientError::Api(ApiError::Upload {
                status: 400,
                message: "bad file".to_string(),
            }))
        });

        let err = mutation.mutate(()).await.unwrap_err();
        assert_eq!(err.to_string(), "bad file");

        let state = mutation.state();
        assert_eq!(state.status, MutationStatus::Error);
        assert_eq!(state.error.map(|e| e.to_string()), Some("bad file".to_string()));

        mutation.reset();
        assert_eq!(mutation.state().status, MutationStatus::Idle);
    }

    #[tokio::test]
    async fn invocations_are_not_deduplicated() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        let mutation = Mutation::new(move |_: ()| {
            counted.fetch_add(1, Ordering::SeqCst);
            async { Ok(Decoded::Raw("done".into())) }
        });

        let (a, b) = tokio::join!(mutation.mutate(()), mutation.mutate(()));
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn last_finished_invocation_wins() {
        let mutation = Mutation::new(|(label, gate): (&'static str, oneshot::Receiver<()>)| async move {
            let _ = gate.await;
            Ok(Decoded::Raw(label.to_string()))
        });

        let (first_tx, first_rx) = oneshot::channel();
        let (second_tx, second_rx) = oneshot::channel();
        let release = async {
            tokio::task::yield_now().await;
            let _ = second_tx.send(());
            tokio::task::yield_now().await;
            let _ = first_tx.send(());
        };
        let (_, _, ()) = tokio::join!(
            mutation.mutate(("first", first_rx)),
            mutation.mutate(("second", second_rx)),
            release
        );

        assert_eq!(mutation.state().data, Some(Decoded::Raw("first".into())));
    }

    #[tokio::test]
    async fn cancelled_invocation_records_error() {
        let mutation = Mutation::new(|_: ()| std::future::pending::<Result<Decoded, ClientError>>());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = mutation.mutate_with_cancel((), &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(mutation.state().status, MutationStatus::Error);
    }

    #[tokio::test]
    async fn success_invalidates_query_keys() {
        let cache = QueryCache::new(QueryConfig::default());
        cache.set_data("health", Decoded::Raw("OK".into()));

        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        let refresh = move || {
            counted.fetch_add(1, Ordering::SeqCst);
            async { Ok(Decoded::Raw("fresh".into())) }
        };

        // Fresh: served from cache.
        cache.fetch("health", refresh.clone()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let failing = Mutation::new(|_: ()| async {
            Err(ClientError::Network(TransportError::Unavailable("refused".into())))
        })
        .invalidates(cache.clone(), ["health"]);
        let _ = failing.mutate(()).await;
        cache.fetch("health", refresh.clone()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let mutation = Mutation::new(|_: ()| async { Ok(Decoded::Raw("saved".into())) })
            .invalidates(cache.clone(), ["health"]);
        mutation.mutate(()).await.unwrap();

        let mut rx = cache.subscribe("health");
        cache.fetch("health", refresh.clone()).await.unwrap();
        rx.wait_for(|s| !s.is_fetching).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.state("health").data, Some(Decoded::Raw("fresh".into())));
    }
}
