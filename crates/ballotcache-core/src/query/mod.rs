//! Cache-first API queries with an observable state machine.
//!
//! A [`CachedQuery`] is bound to one endpoint and parameter set. Running it
//! resolves from the response cache when a fresh entry exists and only goes
//! to the network on a miss:
//!
//! 1. No endpoint: `Idle`, nothing fetched
//! 2. Fresh cache entry: `Success` with no network call
//! 3. Miss: `Loading`, then `Success` (and the response is cached) or
//!    `Error` (and nothing is cached, so the next run tries again)
//!
//! `refetch` drops the entry for the current key and repeats step 3.
//! Identical queries running at the same time are not de-duplicated.

use std::sync::Arc;

use chrono::Duration;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::api::{ApiError, ApiQuery, RemoteSource};
use crate::cache::{Cache, CacheKey, QueryParams};
use crate::store::Store;

#[derive(Debug, Clone)]
pub enum QueryState<T> {
    Idle,
    Loading,
    Success(T),
    Error(Arc<ApiError>),
}

impl<T> QueryState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, QueryState::Loading)
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            QueryState::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ApiError> {
        match self {
            QueryState::Error(err) => Some(err.as_ref()),
            _ => None,
        }
    }

    /// `Ok(None)` for an idle query, the data on success, the error otherwise.
    /// A query still loading is reported as idle.
    pub fn into_result(self) -> Result<Option<T>, Arc<ApiError>> {
        match self {
            QueryState::Success(data) => Ok(Some(data)),
            QueryState::Error(err) => Err(err),
            QueryState::Idle | QueryState::Loading => Ok(None),
        }
    }
}

pub struct CachedQuery<T, R> {
    source: Arc<R>,
    cache: Cache<T>,
    endpoint: Option<String>,
    params: QueryParams,
    state: watch::Sender<QueryState<T>>,
}

impl<T, R> CachedQuery<T, R>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync,
    R: RemoteSource,
{
    pub fn new(source: Arc<R>, cache: Cache<T>, endpoint: Option<&str>, params: QueryParams) -> Self {
        let (state, _) = watch::channel(QueryState::Idle);
        Self {
            source,
            cache,
            endpoint: endpoint.filter(|e| !e.is_empty()).map(String::from),
            params,
            state,
        }
    }

    /// Cache identity of this query, `None` when there is no endpoint.
    pub fn key(&self) -> Option<CacheKey> {
        self.endpoint
            .as_deref()
            .map(|endpoint| CacheKey::compute(endpoint, &self.params))
    }

    pub fn state(&self) -> QueryState<T> {
        self.state.borrow().clone()
    }

    /// Observe every state transition of this query.
    pub fn subscribe(&self) -> watch::Receiver<QueryState<T>> {
        self.state.subscribe()
    }

    pub async fn run(&self) -> QueryState<T> {
        let Some(key) = self.key() else {
            return self.transition(QueryState::Idle);
        };

        if let Some(entry) = self.cache.get(&key) {
            debug!(key = %key, age = %entry.age_display(), "Query served from cache");
            return self.transition(QueryState::Success(entry.data));
        }

        self.fetch(&key).await
    }

    pub async fn refetch(&self) -> QueryState<T> {
        let Some(key) = self.key() else {
            return self.transition(QueryState::Idle);
        };

        self.cache.delete(&key);
        self.fetch(&key).await
    }

    async fn fetch(&self, key: &CacheKey) -> QueryState<T> {
        self.transition(QueryState::Loading);

        let endpoint = self.endpoint.as_deref().unwrap_or_default();
        let next = match self.source.request(endpoint, &self.params).await {
            Ok(value) => match serde_json::from_value::<T>(value) {
                Ok(data) => {
                    self.cache.set(key, &data);
                    QueryState::Success(data)
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Response did not match expected shape");
                    QueryState::Error(Arc::new(ApiError::InvalidResponse(e.to_string())))
                }
            },
            Err(e) => {
                warn!(key = %key, error = %e, retryable = e.is_retryable(), "Query failed");
                QueryState::Error(Arc::new(e))
            }
        };

        self.transition(next)
    }

    fn transition(&self, next: QueryState<T>) -> QueryState<T> {
        self.state.send_replace(next.clone());
        next
    }
}

/// Builds cached queries that share one remote source and one cache.
pub struct QueryClient<R> {
    source: Arc<R>,
    store: Store,
    cache_duration: Duration,
}

impl<R> Clone for QueryClient<R> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            store: self.store.clone(),
            cache_duration: self.cache_duration,
        }
    }
}

impl<R: RemoteSource> QueryClient<R> {
    pub fn new(source: Arc<R>, store: Store, cache_duration: Duration) -> Self {
        Self {
            source,
            store,
            cache_duration,
        }
    }

    pub fn query<T>(&self, query: &ApiQuery) -> CachedQuery<T, R>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync,
    {
        CachedQuery::new(
            Arc::clone(&self.source),
            Cache::new(&self.store, self.cache_duration),
            Some(&query.endpoint),
            query.params.clone(),
        )
    }

    /// Run a query once and return its data.
    pub async fn fetch<T>(&self, query: &ApiQuery) -> Result<Option<T>, Arc<ApiError>>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync,
    {
        self.query::<T>(query).run().await.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    #[derive(Default)]
    struct FakeSource {
        calls: AtomicUsize,
        fail: AtomicBool,
        gate: Option<Semaphore>,
    }

    impl FakeSource {
        fn gated() -> Self {
            Self {
                gate: Some(Semaphore::new(0)),
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl RemoteSource for FakeSource {
        async fn request(&self, endpoint: &str, params: &QueryParams) -> Result<Value, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                let _permit = gate.acquire().await.map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
            }
            tokio::task::yield_now().await;
            if self.fail.load(Ordering::SeqCst) {
                return Err(ApiError::Upstream {
                    status: 500,
                    status_text: "Internal Server Error".to_string(),
                });
            }
            Ok(json!({"endpoint": endpoint, "query": params.to_query_string()}))
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Echo {
        endpoint: String,
        query: String,
    }

    fn setup(source: FakeSource) -> (Arc<FakeSource>, QueryClient<FakeSource>, Store) {
        let source = Arc::new(source);
        let store = Store::in_memory();
        let client = QueryClient::new(Arc::clone(&source), store.clone(), Duration::hours(24));
        (source, client, store)
    }

    #[tokio::test]
    async fn test_empty_endpoint_is_idle_without_network() {
        let (source, _client, store) = setup(FakeSource::default());
        let q: CachedQuery<Echo, _> = CachedQuery::new(
            Arc::clone(&source),
            Cache::new(&store, Duration::hours(24)),
            Some(""),
            QueryParams::new(),
        );
        assert!(q.key().is_none());
        assert!(matches!(q.run().await, QueryState::Idle));
        assert!(matches!(q.refetch().await, QueryState::Idle));

        let q: CachedQuery<Echo, _> = CachedQuery::new(
            source.clone(),
            Cache::new(&store, Duration::hours(24)),
            None,
            QueryParams::new(),
        );
        assert!(matches!(q.run().await, QueryState::Idle));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_second_query_is_served_from_cache() {
        let (source, client, _) = setup(FakeSource::default());
        let query = ApiQuery::candidate_totals("P1", 2020);

        let first: Echo = client.fetch(&query).await.unwrap().unwrap();
        let second: Echo = client.fetch(&query).await.unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(first.query, "election_year=2020");
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let (source, client, store) = setup(FakeSource::default());
        source.fail.store(true, Ordering::SeqCst);
        let query = ApiQuery::committee("C1");

        let q = client.query::<Echo>(&query);
        let state = q.run().await;
        assert_eq!(state.error().and_then(|e| e.status()), Some(500));
        assert!(store.cache().keys("").unwrap().is_empty());

        source.fail.store(false, Ordering::SeqCst);
        let state = q.run().await;
        assert!(state.data().is_some());
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_refetch_bypasses_cache() {
        let (source, client, _) = setup(FakeSource::default());
        let q = client.query::<Echo>(&ApiQuery::presidential_results(2020));

        q.run().await;
        q.run().await;
        assert_eq!(source.calls(), 1);

        let state = q.refetch().await;
        assert!(state.data().is_some());
        assert_eq!(source.calls(), 2);

        q.run().await;
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_shape_mismatch_is_an_error_and_not_cached() {
        let (_, client, store) = setup(FakeSource::default());
        let q = client.query::<Vec<u32>>(&ApiQuery::committee("C1"));
        let state = q.run().await;
        assert!(matches!(state.error(), Some(ApiError::InvalidResponse(_))));
        assert!(store.cache().keys("").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_identical_queries_both_fetch() {
        let (source, client, _) = setup(FakeSource::default());
        let query = ApiQuery::committee("C1");
        let a = client.query::<Echo>(&query);
        let b = client.query::<Echo>(&query);

        let (ra, rb) = futures::join!(a.run(), b.run());
        assert!(ra.data().is_some());
        assert!(rb.data().is_some());
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_loading_state_is_observable() {
        let (source, client, _) = setup(FakeSource::gated());
        let q = Arc::new(client.query::<Echo>(&ApiQuery::committee("C1")));
        let mut rx = q.subscribe();

        let task = {
            let q = Arc::clone(&q);
            tokio::spawn(async move { q.run().await })
        };

        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_loading());

        source.gate.as_ref().unwrap().add_permits(1);
        let state = task.await.unwrap();
        assert!(state.data().is_some());
        assert!(q.state().data().is_some());
    }
}
