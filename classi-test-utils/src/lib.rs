//! Classi Test Utilities
//!
//! Centralized test infrastructure for the classi workspace:
//! - Proptest generators for taxonomy snapshots
//! - Mock data sources for cache and concurrency tests
//! - Test fixtures for common scenarios
//! - Custom assertions for classi-specific errors

// Re-export the in-memory source from its home crate
pub use classi_storage::{InMemoryNodeSource, NodeSource};

// Re-export core types for convenience
pub use classi_core::{
    BuildWarning, ClassiConfig, ClassiError, ClassiResult, DataSourceError, Level, NodeId,
    TaxonomyError, TaxonomyKind, TaxonomyNode, TaxonomyTree,
};

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;

// ============================================================================
// MOCK SOURCES
// ============================================================================

/// Node source whose loads block until released.
///
/// Lets a test hold a fetch "in flight" for as long as it needs, then let it
/// finish. Each call to [`GatedSource::release`] lets that many loads through.
#[derive(Debug)]
pub struct GatedSource {
    inner: InMemoryNodeSource,
    gate: Semaphore,
    started: AtomicUsize,
}

impl GatedSource {
    pub fn new(inner: InMemoryNodeSource) -> Self {
        Self {
            inner,
            gate: Semaphore::new(0),
            started: AtomicUsize::new(0),
        }
    }

    /// Let `loads` pending or future loads complete.
    pub fn release(&self, loads: usize) {
        self.gate.add_permits(loads);
    }

    /// Loads that have begun, whether or not they were released.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &InMemoryNodeSource {
        &self.inner
    }
}

#[async_trait]
impl NodeSource for GatedSource {
    async fn load_flat_nodes(&self, kind: TaxonomyKind) -> ClassiResult<Vec<TaxonomyNode>> {
        self.started.fetch_add(1, Ordering::SeqCst);
        match self.gate.acquire().await {
            Ok(permit) => permit.forget(),
            Err(_) => {
                return Err(DataSourceError::Unavailable {
                    taxonomy: kind,
                    reason: "gate closed".to_string(),
                }
                .into())
            }
        }
        self.inner.load_flat_nodes(kind).await
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for taxonomy snapshots.

    use super::*;
    use proptest::prelude::*;
    use proptest::sample::Index;

    /// Generate a taxonomy kind.
    pub fn arb_taxonomy_kind() -> impl Strategy<Value = TaxonomyKind> {
        prop_oneof![Just(TaxonomyKind::Categories), Just(TaxonomyKind::Locations)]
    }

    /// Generate a node id in either of the upstream key styles.
    pub fn arb_node_id() -> impl Strategy<Value = NodeId> {
        prop_oneof![
            (1u64..100_000).prop_map(NodeId::from),
            "[a-z0-9]{8}".prop_map(NodeId::from),
        ]
    }

    /// Generate a well-formed snapshot for `kind`: no cycles, no orphans,
    /// unique ids and slugs, nothing past the depth ceiling, rows shuffled.
    pub fn arb_taxonomy(kind: TaxonomyKind) -> impl Strategy<Value = Vec<TaxonomyNode>> {
        prop::collection::vec((any::<bool>(), any::<Index>()), 0..40)
            .prop_map(move |shape| taxonomy_from_shape(kind, &shape))
            .prop_shuffle()
    }

    /// Each `(is_root, parent)` pair becomes one node. A non-root picks its
    /// parent among earlier nodes that still have room below them.
    fn taxonomy_from_shape(kind: TaxonomyKind, shape: &[(bool, Index)]) -> Vec<TaxonomyNode> {
        let mut nodes: Vec<TaxonomyNode> = Vec::with_capacity(shape.len());
        let mut depths: Vec<usize> = Vec::with_capacity(shape.len());

        for (i, (is_root, parent)) in shape.iter().enumerate() {
            let id = format!("{}", i + 1);
            let name = format!("{} {}", kind, i + 1);
            let slug = format!("{}-{}", kind, i + 1);

            let candidates: Vec<usize> = (0..i)
                .filter(|&j| depths[j] + 1 < kind.max_depth())
                .collect();

            if *is_root || candidates.is_empty() {
                nodes.push(TaxonomyNode::root(id, name, slug));
                depths.push(0);
            } else {
                let j = *parent.get(&candidates);
                nodes.push(TaxonomyNode::child(id, nodes[j].id.clone(), name, slug));
                depths.push(depths[j] + 1);
            }
        }

        nodes
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built snapshots for common testing scenarios.

    use super::*;
    use std::time::Duration;

    /// Config with the same window for every taxonomy.
    pub fn config_with_stale_time(stale_time: Duration) -> ClassiConfig {
        ClassiConfig::uniform(stale_time)
    }

    /// Design > Logo > Logo design, plus a second branch and root.
    pub fn design_categories() -> Vec<TaxonomyNode> {
        vec![
            TaxonomyNode::root(1i64, "Design", "design"),
            TaxonomyNode::child(2i64, 1i64, "Logo", "logo"),
            TaxonomyNode::child(3i64, 2i64, "Logo design", "logo-design"),
            TaxonomyNode::child(4i64, 1i64, "Web", "web"),
            TaxonomyNode::child(5i64, 4i64, "Landing pages", "landing-pages"),
            TaxonomyNode::root(6i64, "Writing", "writing"),
        ]
    }

    /// Two towns, three quarters.
    pub fn sample_locations() -> Vec<TaxonomyNode> {
        vec![
            TaxonomyNode::root("sofia", "Sofia", "sofia"),
            TaxonomyNode::child("lozenets", "sofia", "Lozenets", "lozenets"),
            TaxonomyNode::child("mladost", "sofia", "Mladost", "mladost"),
            TaxonomyNode::root("plovdiv", "Plovdiv", "plovdiv"),
            TaxonomyNode::child("kapana", "plovdiv", "Kapana", "kapana"),
        ]
    }

    /// A valid root plus a two-node cycle (10 -> 11 -> 10).
    pub fn cyclic_categories() -> Vec<TaxonomyNode> {
        vec![
            TaxonomyNode::root(1i64, "Design", "design"),
            TaxonomyNode::child(10i64, 11i64, "Loop A", "loop-a"),
            TaxonomyNode::child(11i64, 10i64, "Loop B", "loop-b"),
            TaxonomyNode::child(2i64, 1i64, "Logo", "logo"),
        ]
    }

    /// A node whose parent no longer exists.
    pub fn orphan_categories() -> Vec<TaxonomyNode> {
        vec![
            TaxonomyNode::root(1i64, "Design", "design"),
            TaxonomyNode::child(2i64, 99i64, "Deleted parent", "deleted-parent"),
        ]
    }

    /// Two subgroups sharing the slug "logo" under different roots.
    pub fn duplicate_slug_categories() -> Vec<TaxonomyNode> {
        vec![
            TaxonomyNode::root(1i64, "Design", "design"),
            TaxonomyNode::child(2i64, 1i64, "Logo", "logo"),
            TaxonomyNode::root(3i64, "Print", "print"),
            TaxonomyNode::child(4i64, 3i64, "Logo", "logo"),
        ]
    }

    /// Source preloaded with design categories and sample locations.
    pub fn populated_source() -> InMemoryNodeSource {
        InMemoryNodeSource::new()
            .with_nodes(TaxonomyKind::Categories, design_categories())
            .with_nodes(TaxonomyKind::Locations, sample_locations())
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertion helpers for classi-specific errors.

    use super::*;

    /// Assert that a ClassiResult is Ok.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &ClassiResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a ClassiResult is a NotFound taxonomy error.
    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &ClassiResult<T>) {
        match result {
            Err(ClassiError::Taxonomy(TaxonomyError::NotFound { .. })) => {}
            other => panic!("Expected NotFound error, got: {:?}", other),
        }
    }

    /// Assert that a ClassiResult is Ambiguous over exactly `ids`.
    #[track_caller]
    pub fn assert_ambiguous<T: std::fmt::Debug>(result: &ClassiResult<T>, ids: &[NodeId]) {
        match result {
            Err(ClassiError::Taxonomy(TaxonomyError::Ambiguous { ids: got, .. })) => {
                let mut got = got.clone();
                let mut expected = ids.to_vec();
                got.sort();
                expected.sort();
                assert_eq!(got, expected, "Wrong ids in Ambiguous error");
            }
            other => panic!("Expected Ambiguous error, got: {:?}", other),
        }
    }

    /// Assert that a ClassiResult is a DataSource Unavailable error.
    #[track_caller]
    pub fn assert_unavailable<T: std::fmt::Debug>(result: &ClassiResult<T>) {
        match result {
            Err(ClassiError::DataSource(DataSourceError::Unavailable { .. })) => {}
            other => panic!("Expected Unavailable error, got: {:?}", other),
        }
    }

    /// Assert that a built tree has no warnings.
    #[track_caller]
    pub fn assert_clean_build(tree: &TaxonomyTree) {
        assert!(
            tree.warnings().is_empty(),
            "Expected clean build, got warnings: {:?}",
            tree.warnings()
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================
