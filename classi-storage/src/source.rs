//! Data source seam for flat taxonomy snapshots.
//!
//! The persistent store is an external collaborator. Anything that can hand
//! back the flat node list for one taxonomy implements [`NodeSource`].

use ::async_trait::async_trait;
use classi_core::{
    CacheError, ClassiResult, DataSourceError, TaxonomyKind, TaxonomyNode,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// Supplies flat node lists.
///
/// Implementations own their timeout policy; the cache imposes none.
#[async_trait]
pub trait NodeSource: Send + Sync {
    /// Load every node of `kind`, in upstream order.
    async fn load_flat_nodes(&self, kind: TaxonomyKind) -> ClassiResult<Vec<TaxonomyNode>>;
}

#[async_trait]
impl<S: NodeSource + ?Sized> NodeSource for Arc<S> {
    async fn load_flat_nodes(&self, kind: TaxonomyKind) -> ClassiResult<Vec<TaxonomyNode>> {
        (**self).load_flat_nodes(kind).await
    }
}

/// In-memory node source.
///
/// Holds one snapshot per taxonomy, can be switched into a failing state to
/// simulate an outage, and counts loads.
#[derive(Debug, Default)]
pub struct InMemoryNodeSource {
    snapshots: RwLock<HashMap<TaxonomyKind, Vec<TaxonomyNode>>>,
    outage: RwLock<Option<String>>,
    loads: AtomicUsize,
}

impl InMemoryNodeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style snapshot setup.
    pub fn with_nodes(self, kind: TaxonomyKind, nodes: Vec<TaxonomyNode>) -> Self {
        if let Ok(mut snapshots) = self.snapshots.write() {
            snapshots.insert(kind, nodes);
        }
        self
    }

    /// Replace the snapshot for `kind`, as an admin edit would.
    pub fn set_nodes(&self, kind: TaxonomyKind, nodes: Vec<TaxonomyNode>) -> ClassiResult<()> {
        self.snapshots
            .write()
            .map_err(|_| CacheError::LockPoisoned)?
            .insert(kind, nodes);
        Ok(())
    }

    /// Make every load fail with `reason`.
    pub fn set_unavailable(&self, reason: impl Into<String>) -> ClassiResult<()> {
        *self.outage.write().map_err(|_| CacheError::LockPoisoned)? = Some(reason.into());
        Ok(())
    }

    pub fn set_available(&self) -> ClassiResult<()> {
        *self.outage.write().map_err(|_| CacheError::LockPoisoned)? = None;
        Ok(())
    }

    /// Number of loads attempted, failed ones included.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NodeSource for InMemoryNodeSource {
    async fn load_flat_nodes(&self, kind: TaxonomyKind) -> ClassiResult<Vec<TaxonomyNode>> {
        self.loads.fetch_add(1, Ordering::SeqCst);

        let outage = self
            .outage
            .read()
            .map_err(|_| CacheError::LockPoisoned)?
            .clone();
        if let Some(reason) = outage {
            return Err(DataSourceError::Unavailable {
                taxonomy: kind,
                reason,
            }
            .into());
        }

        let snapshots = self.snapshots.read().map_err(|_| CacheError::LockPoisoned)?;
        Ok(snapshots.get(&kind).cloned().unwrap_or_default())
    }
}
