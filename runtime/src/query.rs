//! Keyed query cache with request coalescing and stale-while-revalidate.
//!
//! # Design
//! The cache is an explicit object owned by the application context, not a
//! module-level singleton. Each key maps to one entry holding the last known
//! state, an optional in-flight fetch, and a `watch` channel that pushes every
//! state change to subscribers.
//!
//! A fetch runs on its own spawned task and publishes its result through a
//! shared oneshot. A caller that asks for the key while it is pending is
//! served the cached value if there is one, and otherwise awaits that same
//! result, so concurrent reads cost one network call. A caller that goes away
//! only detaches; the fetch still completes and fills the cache. The cache's
//! cancellation token aborts all pending fetches on teardown.
//!
//! Invalidation bumps an epoch on the entry. A fetch that started before the
//! latest invalidation still records its value, but the entry stays stale.
//!
//! Freshness uses `tokio::time::Instant`, so tests can pause and advance the
//! clock deterministically.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use loanguard_core::config::DEFAULT_STALE_TIME;
use loanguard_core::{ApiConfig, Decoded};
use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ClientError;

/// Outcome shared by every subscriber of one fetch.
pub type QueryResult = Result<Decoded, Arc<ClientError>>;

type SharedFetch = Shared<BoxFuture<'static, QueryResult>>;

type Fetcher = Arc<dyn Fn() -> BoxFuture<'static, Result<Decoded, ClientError>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Never fetched.
    Idle,
    /// First fetch in progress; no data yet.
    Loading,
    Success,
    Error,
}

/// Snapshot of one query key.
#[derive(Debug, Clone)]
pub struct QueryState {
    pub status: QueryStatus,
    /// Last successful value. Kept across later errors and refetches.
    pub data: Option<Decoded>,
    pub error: Option<Arc<ClientError>>,
    pub last_fetched_at: Option<Instant>,
    /// A fetch is in flight, including background refetches of cached data.
    pub is_fetching: bool,
}

impl QueryState {
    fn idle() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            last_fetched_at: None,
            is_fetching: false,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }
}

#[derive(Debug, Clone)]
pub struct QueryConfig {
    pub stale_time: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            stale_time: DEFAULT_STALE_TIME,
        }
    }
}

impl From<&ApiConfig> for QueryConfig {
    fn from(config: &ApiConfig) -> Self {
        Self {
            stale_time: config.stale_time,
        }
    }
}

struct InFlight {
    id: u64,
    /// Invalidation epoch of the entry when the fetch started.
    epoch: u64,
    pending: SharedFetch,
}

struct Entry {
    state: QueryState,
    invalidated: bool,
    epoch: u64,
    in_flight: Option<InFlight>,
    tx: watch::Sender<QueryState>,
}

impl Entry {
    fn new() -> Self {
        let state = QueryState::idle();
        let (tx, _) = watch::channel(state.clone());
        Self {
            state,
            invalidated: false,
            epoch: 0,
            in_flight: None,
            tx,
        }
    }

    /// Back to `Idle`, keeping the channel so subscribers stay attached.
    fn reset(&mut self) {
        self.state = QueryState::idle();
        self.invalidated = false;
        self.in_flight = None;
        self.publish();
    }

    fn has_subscribers(&self) -> bool {
        self.tx.receiver_count() > 0
    }

    fn publish(&self) {
        self.tx.send_replace(self.state.clone());
    }

    /// Cached value if it is younger than `stale_time` and not invalidated.
    fn fresh_data(&self, now: Instant, stale_time: Duration) -> Option<Decoded> {
        if self.invalidated {
            return None;
        }
        let at = self.state.last_fetched_at?;
        if now.duration_since(at) < stale_time {
            self.state.data.clone()
        } else {
            None
        }
    }
}

/// How a caller is served once the entry lock is released.
enum Plan {
    Attach(SharedFetch),
    Start(u64, SharedFetch, oneshot::Sender<QueryResult>, Option<Decoded>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Serve fresh data; revalidate stale data in the background.
    Cached,
    /// Always go to the network (still coalesced with an in-flight fetch).
    Force,
}

struct Inner {
    config: QueryConfig,
    entries: Mutex<HashMap<String, Entry>>,
    next_fetch: AtomicU64,
    cancel: CancellationToken,
}

/// Cheaply cloneable handle to a shared keyed cache.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<Inner>,
}

impl QueryCache {
    pub fn new(config: QueryConfig) -> Self {
        Self::with_cancel(config, CancellationToken::new())
    }

    /// Cache whose pending fetches abort when `cancel` fires.
    pub fn with_cancel(config: QueryConfig, cancel: CancellationToken) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                entries: Mutex::new(HashMap::new()),
                next_fetch: AtomicU64::new(1),
                cancel,
            }),
        }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.inner.config
    }

    /// Read `key` with the cache's default staleness window.
    ///
    /// - Fresh data is returned without touching the network.
    /// - While a fetch for `key` is in flight, cached data (fresh or stale) is
    ///   returned as is; with no data the caller joins that fetch.
    /// - Stale or invalidated data is returned immediately while exactly one
    ///   background refetch updates the entry.
    /// - With no data, the fetch runs in the foreground.
    pub async fn fetch<F, Fut>(&self, key: &str, fetcher: F) -> QueryResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Decoded, ClientError>> + Send + 'static,
    {
        self.run(key, self.inner.config.stale_time, Mode::Cached, fetcher).await
    }

    /// Like `fetch`, with a per-call staleness window.
    pub async fn fetch_with_stale_time<F, Fut>(&self, key: &str, stale_time: Duration, fetcher: F) -> QueryResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Decoded, ClientError>> + Send + 'static,
    {
        self.run(key, stale_time, Mode::Cached, fetcher).await
    }

    /// Go to the network and wait for the result, joining any fetch already
    /// in flight for `key`. Never served from cache.
    pub async fn refetch<F, Fut>(&self, key: &str, fetcher: F) -> QueryResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Decoded, ClientError>> + Send + 'static,
    {
        self.run(key, self.inner.config.stale_time, Mode::Force, fetcher).await
    }

    async fn run<F, Fut>(&self, key: &str, stale_time: Duration, mode: Mode, fetcher: F) -> QueryResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Decoded, ClientError>> + Send + 'static,
    {
        if self.inner.cancel.is_cancelled() {
            return Err(Arc::new(ClientError::Cancelled));
        }

        let plan = {
            let mut entries = self.inner.entries.lock();
            let entry = entries.entry(key.to_string()).or_insert_with(Entry::new);
            let fresh = match mode {
                Mode::Cached => entry.fresh_data(Instant::now(), stale_time),
                Mode::Force => None,
            };
            if let Some(in_flight) = &entry.in_flight {
                match (mode, &entry.state.data) {
                    (Mode::Cached, Some(data)) => return Ok(data.clone()),
                    _ => Plan::Attach(in_flight.pending.clone()),
                }
            } else if let Some(data) = fresh {
                return Ok(data);
            } else {
                let id = self.inner.next_fetch.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = oneshot::channel();
                let pending = async move { rx.await.unwrap_or_else(|_| Err(Arc::new(ClientError::Cancelled))) }
                    .boxed()
                    .shared();
                entry.in_flight = Some(InFlight {
                    id,
                    epoch: entry.epoch,
                    pending: pending.clone(),
                });
                entry.state.is_fetching = true;
                if entry.state.data.is_none() {
                    entry.state.status = QueryStatus::Loading;
                }
                entry.publish();
                let stale = match mode {
                    Mode::Cached => entry.state.data.clone(),
                    Mode::Force => None,
                };
                Plan::Start(id, pending, tx, stale)
            }
        };

        match plan {
            Plan::Attach(pending) => {
                debug!(key, "joining in-flight query");
                pending.await
            }
            Plan::Start(id, pending, tx, stale) => {
                debug!(key, id, background = stale.is_some(), "query fetch");
                self.spawn_fetch(key.to_string(), id, tx, fetcher());
                match stale {
                    Some(data) => Ok(data),
                    None => pending.await,
                }
            }
        }
    }

    fn spawn_fetch<Fut>(&self, key: String, id: u64, tx: oneshot::Sender<QueryResult>, fut: Fut)
    where
        Fut: Future<Output = Result<Decoded, ClientError>> + Send + 'static,
    {
        let cache = self.clone();
        let cancel = self.inner.cancel.clone();
        tokio::spawn(async move {
            let result: QueryResult = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(Arc::new(ClientError::Cancelled)),
                result = fut => result.map_err(Arc::new),
            };
            cache.settle(&key, id, &result);
            let _ = tx.send(result);
        });
    }

    /// Record a finished fetch, unless the entry was removed or replaced.
    fn settle(&self, key: &str, id: u64, result: &QueryResult) {
        let mut entries = self.inner.entries.lock();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };
        let started_epoch = match &entry.in_flight {
            Some(in_flight) if in_flight.id == id => in_flight.epoch,
            _ => return,
        };
        entry.in_flight = None;
        entry.state.is_fetching = false;
        match result {
            Ok(data) => {
                entry.state.status = QueryStatus::Success;
                entry.state.data = Some(data.clone());
                entry.state.error = None;
                entry.state.last_fetched_at = Some(Instant::now());
                entry.invalidated = started_epoch != entry.epoch;
            }
            Err(e) => {
                warn!(key, error = %e, "query failed");
                entry.state.status = QueryStatus::Error;
                entry.state.error = Some(e.clone());
            }
        }
        entry.publish();
    }

    /// Current snapshot; `Idle` for unknown keys.
    pub fn state(&self, key: &str) -> QueryState {
        self.inner
            .entries
            .lock()
            .get(key)
            .map(|entry| entry.state.clone())
            .unwrap_or_else(QueryState::idle)
    }

    /// Receiver that observes every state change of `key`.
    pub fn subscribe(&self, key: &str) -> watch::Receiver<QueryState> {
        let mut entries = self.inner.entries.lock();
        entries.entry(key.to_string()).or_insert_with(Entry::new).tx.subscribe()
    }

    /// Mark `key` stale so the next read refetches, including when a fetch
    /// already in flight lands afterwards. Returns false for unknown keys.
    pub fn invalidate(&self, key: &str) -> bool {
        match self.inner.entries.lock().get_mut(key) {
            Some(entry) => {
                entry.invalidated = true;
                entry.epoch += 1;
                true
            }
            None => false,
        }
    }

    /// Seed or overwrite `key` with a known value, fresh as of now.
    pub fn set_data(&self, key: &str, data: Decoded) {
        let mut entries = self.inner.entries.lock();
        let entry = entries.entry(key.to_string()).or_insert_with(Entry::new);
        entry.state.status = QueryStatus::Success;
        entry.state.data = Some(data);
        entry.state.error = None;
        entry.state.last_fetched_at = Some(Instant::now());
        entry.invalidated = false;
        entry.publish();
    }

    /// Drop `key`. A fetch still in flight completes for its waiters but is
    /// not written back. A key with live subscribers is reset to `Idle`
    /// instead, so their receivers keep seeing later fetches.
    pub fn remove(&self, key: &str) -> bool {
        let mut entries = self.inner.entries.lock();
        let keep = match entries.get(key) {
            Some(entry) => entry.has_subscribers(),
            None => return false,
        };
        if keep {
            if let Some(entry) = entries.get_mut(key) {
                entry.reset();
            }
        } else {
            entries.remove(key);
        }
        true
    }

    /// `remove` for every key.
    pub fn clear(&self) {
        self.inner.entries.lock().retain(|_, entry| {
            if entry.has_subscribers() {
                entry.reset();
                true
            } else {
                false
            }
        });
    }

    /// Keys currently tracked, including reset keys that still have subscribers.
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Abort pending fetches and empty the cache. Later reads fail with
    /// `ClientError::Cancelled`.
    pub fn teardown(&self) {
        self.inner.cancel.cancel();
        self.clear();
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("config", &self.inner.config)
            .field("entries", &self.len())
            .finish()
    }
}

/// A cache key bound to its fetch function, reusable by UI code.
#[derive(Clone)]
pub struct Query {
    cache: QueryCache,
    key: String,
    stale_time: Duration,
    fetcher: Fetcher,
}

impl Query {
    pub fn new<F, Fut>(cache: QueryCache, key: impl Into<String>, fetcher: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Decoded, ClientError>> + Send + 'static,
    {
        let stale_time = cache.config().stale_time;
        Self {
            cache,
            key: key.into(),
            stale_time,
            fetcher: Arc::new(move || fetcher().boxed()),
        }
    }

    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn fetch(&self) -> QueryResult {
        let fetcher = self.fetcher.clone();
        self.cache
            .fetch_with_stale_time(&self.key, self.stale_time, move || fetcher())
            .await
    }

    /// Manual retry / refresh: always waits for a network result.
    pub async fn refetch(&self) -> QueryResult {
        let fetcher = self.fetcher.clone();
        self.cache.refetch(&self.key, move || fetcher()).await
    }

    pub fn state(&self) -> QueryState {
        self.cache.state(&self.key)
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryState> {
        self.cache.subscribe(&self.key)
    }

    pub fn invalidate(&self) -> bool {
        self.cache.invalidate(&self.key)
    }
}
