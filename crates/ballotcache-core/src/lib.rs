//! ballotcache core - a caching FEC data client and election dataset store.
//!
//! Everything sits on one [`store::Store`]: cached API responses under
//! `api_cache_`, the canonical election dataset under well-known keys, and
//! admin records under `admin_`. Components that need to react to writes
//! subscribe through a [`notify::Notifier`].

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod elections;
pub mod finance;
pub mod models;
pub mod notify;
pub mod query;
pub mod staleness;
pub mod store;
pub mod sync;
pub mod utils;

pub use api::{ApiError, ApiQuery, FecClient, RemoteSource};
pub use cache::{Cache, CacheEntry, CacheKey, CacheStats, QueryParams};
pub use config::Config;
pub use elections::{DataError, ElectionData, ElectionWatcher};
pub use finance::{FecFinance, FinanceEstimator};
pub use notify::{BroadcastNotifier, Notifier, NotifierRef, StorageEvent};
pub use query::{CachedQuery, QueryClient, QueryState};
pub use staleness::{Staleness, StalenessTracker};
pub use store::{FileMedium, KvMedium, MemoryMedium, Store, StoreError};
pub use sync::{DatasetSource, StaticDatasetSource, SyncError, SyncService};
