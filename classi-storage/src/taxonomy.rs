//! Cached taxonomy access.
//!
//! Every query is answered against the tree held by the refresh cache under
//! `taxonomy:<kind>`, so all callers in the process see the same generation
//! of a taxonomy until it is refreshed.

use crate::cache::{CacheRead, CacheStats, RefreshCache};
use crate::source::NodeSource;
use classi_core::{
    ClassiConfig, ClassiResult, Level, NodeId, ResolvedNode, TaxonomyKind, TaxonomyNode,
    TaxonomyTree,
};
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Key prefix shared by every taxonomy entry.
pub const TAXONOMY_KEY_PREFIX: &str = "taxonomy:";

/// Cache key for one taxonomy.
pub fn taxonomy_key(kind: TaxonomyKind) -> String {
    format!("{}{}", TAXONOMY_KEY_PREFIX, kind)
}

/// Taxonomy resolver backed by a stale-while-revalidate cache.
pub struct TaxonomyCache<S> {
    source: Arc<S>,
    cache: RefreshCache<TaxonomyTree>,
    config: ClassiConfig,
}

impl<S> Clone for TaxonomyCache<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            cache: self.cache.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: NodeSource + 'static> TaxonomyCache<S> {
    /// Create an adapter with its own cache.
    pub fn new(source: S, config: ClassiConfig) -> ClassiResult<Self> {
        Self::with_cache(Arc::new(source), config, RefreshCache::new())
    }

    /// Create an adapter over an existing cache (e.g. one on a manual clock).
    pub fn with_cache(
        source: Arc<S>,
        config: ClassiConfig,
        cache: RefreshCache<TaxonomyTree>,
    ) -> ClassiResult<Self> {
        config.validate()?;
        Ok(Self {
            source,
            cache,
            config,
        })
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    pub fn config(&self) -> &ClassiConfig {
        &self.config
    }

    /// Current tree for `kind`, refreshing as needed.
    pub async fn get_tree(&self, kind: TaxonomyKind) -> ClassiResult<Arc<TaxonomyTree>> {
        self.read_tree(kind).await.map(CacheRead::into_value)
    }

    /// Like [`Self::get_tree`] but with staleness metadata.
    pub async fn read_tree(&self, kind: TaxonomyKind) -> ClassiResult<CacheRead<TaxonomyTree>> {
        self.cache
            .read(&taxonomy_key(kind), self.config.stale_time(kind), || {
                self.load_and_build(kind)
            })
            .await
    }

    pub async fn resolve_by_id(&self, kind: TaxonomyKind, id: &NodeId) -> ClassiResult<ResolvedNode> {
        self.get_tree(kind).await?.resolve_by_id(id)
    }

    pub async fn resolve_by_slug(&self, kind: TaxonomyKind, slug: &str) -> ClassiResult<ResolvedNode> {
        self.get_tree(kind).await?.resolve_by_slug(slug)
    }

    /// Resolve a `/`-separated root-first slug path.
    pub async fn resolve_slug_path(
        &self,
        kind: TaxonomyKind,
        path: &str,
    ) -> ClassiResult<ResolvedNode> {
        self.get_tree(kind).await?.resolve_slug_path(path)
    }

    pub async fn level_of(&self, kind: TaxonomyKind, id: &NodeId) -> ClassiResult<Level> {
        self.get_tree(kind).await?.level_of(id)
    }

    pub async fn roots(&self, kind: TaxonomyKind) -> ClassiResult<Vec<ResolvedNode>> {
        Ok(self.get_tree(kind).await?.roots())
    }

    pub async fn descendant_ids(
        &self,
        kind: TaxonomyKind,
        id: &NodeId,
    ) -> ClassiResult<BTreeSet<NodeId>> {
        self.get_tree(kind).await?.descendant_ids(id)
    }

    pub async fn breadcrumbs(
        &self,
        kind: TaxonomyKind,
        id: &NodeId,
    ) -> ClassiResult<Vec<TaxonomyNode>> {
        self.get_tree(kind).await?.breadcrumbs(id)
    }

    /// Force the next read of `kind` to refresh. The current tree keeps
    /// being served until the refresh lands.
    pub fn invalidate(&self, kind: TaxonomyKind) -> ClassiResult<usize> {
        let count = usize::from(self.cache.invalidate_key(&taxonomy_key(kind))?);
        debug!(taxonomy = %kind, count, "taxonomy invalidated");
        Ok(count)
    }

    pub fn invalidate_all(&self) -> ClassiResult<usize> {
        self.cache.invalidate_prefix(TAXONOMY_KEY_PREFIX)
    }

    /// Drop every cached tree; the next read of each waits for a load.
    pub fn clear(&self) -> ClassiResult<usize> {
        self.cache.clear_prefix(TAXONOMY_KEY_PREFIX)
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Wait for any in-flight refresh of `kind`.
    pub async fn wait_for_refresh(&self, kind: TaxonomyKind) -> ClassiResult<Option<Arc<TaxonomyTree>>> {
        self.cache.wait_for_refresh(&taxonomy_key(kind)).await
    }

    fn load_and_build(
        &self,
        kind: TaxonomyKind,
    ) -> impl Future<Output = ClassiResult<TaxonomyTree>> + Send + 'static {
        let source = Arc::clone(&self.source);
        async move {
            let nodes = source.load_flat_nodes(kind).await?;
            let input = nodes.len();
            let tree = TaxonomyTree::build(kind, nodes);

            for warning in tree.warnings() {
                warn!(taxonomy = %kind, %warning, "taxonomy build warning");
            }
            info!(
                taxonomy = %kind,
                input,
                nodes = tree.len(),
                warnings = tree.warnings().len(),
                "taxonomy tree rebuilt"
            );
            Ok(tree)
        }
    }
}
