//! Local caching of FEC API responses.
//!
//! Responses are stored as `{data, timestamp}` JSON under the `api_cache_`
//! prefix and expire after the configured cache duration (24 hours by
//! default). Keys are derived from the endpoint and its sorted parameters so
//! equivalent queries always land on the same entry.

pub mod key;
pub mod manager;

pub use key::{CacheKey, QueryParams};
pub use manager::{Cache, CacheEntry, CacheStats, DEFAULT_CACHE_DURATION_HOURS};
