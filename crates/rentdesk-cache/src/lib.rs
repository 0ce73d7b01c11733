//! Keyed TTL cache for dashboard reference data.
//!
//! A [`TtlCache`] holds a fixed set of named slots, each with its own TTL.
//! [`TtlCache::get`] serves fresh values without calling the fetcher, shares
//! one fetch between concurrent misses, and falls back to a stale value when
//! a refresh fails. Values are handed out as `Arc<T>`; a hit returns the same
//! allocation that was stored.
//!
//! ```
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! use std::time::Duration;
//! use rentdesk_cache::{CacheConfig, TtlCache};
//!
//! let cache: TtlCache = TtlCache::new(
//!     CacheConfig::new(Vec::new()).slot("owners", Duration::from_secs(300)),
//! );
//! let owners = cache
//!     .get("owners", || async { Ok::<_, std::io::Error>(serde_json::json!([])) }, false)
//!     .await
//!     .unwrap();
//! assert!(cache.is_valid("owners"));
//! assert_eq!(*owners, serde_json::json!([]));
//! # });
//! ```

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod stats;
pub mod store;
pub mod stream;

pub use cache::{Listener, ListenerId, TtlCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, DEFAULT_STORAGE_PREFIX, SlotConfig};
pub use error::{CacheError, FetchError};
pub use stats::{CacheStats, SlotStats, StatsTotals, format_rate};
pub use store::{FileStore, KvStore, MemoryStore, StoredEntry};
pub use stream::{SlotStream, SlotWatchStream, Snapshot};
