//! Classi Storage - Background-Refresh Cache and Cached Taxonomy Access
//!
//! The cache is generic over its values; the taxonomy adapter is its main
//! consumer. The data store itself is an external collaborator reached
//! through [`NodeSource`].

pub mod cache;
pub mod source;
pub mod taxonomy;

pub use cache::{
    CacheEntry, CacheRead, CacheStats, CachedFetch, Clock, EntryState, ManualClock, ReadOrigin,
    RefreshCache, SystemClock,
};
pub use source::{InMemoryNodeSource, NodeSource};
pub use taxonomy::{taxonomy_key, TaxonomyCache, TAXONOMY_KEY_PREFIX};
