//! Stale-while-revalidate cache.
//!
//! Reads never block on a refresh once a value exists. A value past its
//! staleness window (or explicitly invalidated) is still returned, and the
//! read schedules one background fetch to replace it. Only the very first
//! read of a key waits, and concurrent first reads share a single fetch.
//!
//! Reads return [`CacheRead<T>`], which says whether the value was fresh,
//! stale, or just fetched.
//!
//! # Example
//!
//! ```ignore
//! let cache: RefreshCache<TaxonomyTree> = RefreshCache::new();
//!
//! let read = cache
//!     .read("taxonomy:categories", Duration::from_secs(3600), || load_tree())
//!     .await?;
//!
//! if read.was_stale() {
//!     tracing::debug!("served stale tree; refresh running");
//! }
//! ```

pub mod clock;
pub mod entry;
pub mod refresh;
pub mod stats;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, CacheRead, EntryState, ReadOrigin};
pub use refresh::{CachedFetch, RefreshCache};
pub use stats::CacheStats;
