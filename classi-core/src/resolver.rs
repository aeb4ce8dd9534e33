//! Read-only queries over a built [`TaxonomyTree`].
//!
//! Every query here is a pure function of the tree snapshot. Lookups that
//! cannot be answered unambiguously return an error instead of guessing:
//! a wrong guess would silently produce the wrong breadcrumb or listing
//! filter.

use crate::tree::TaxonomyTree;
use crate::{ClassiResult, Level, Lookup, NodeId, TaxonomyError, TaxonomyNode};
use serde::Serialize;
use std::collections::BTreeSet;

/// A node together with its ancestor chain and descendant closure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedNode {
    pub node: TaxonomyNode,
    pub level: Level,
    pub depth: usize,
    /// Immediate parent first, root last. Empty for roots.
    pub ancestors: Vec<TaxonomyNode>,
    /// The node's own id plus every id below it.
    pub descendant_ids: BTreeSet<NodeId>,
}

impl ResolvedNode {
    pub fn is_root(&self) -> bool {
        self.ancestors.is_empty()
    }

    pub fn is_leaf(&self) -> bool {
        self.descendant_ids.len() == 1
    }

    /// Root-first chain ending with the node itself.
    pub fn breadcrumbs(&self) -> Vec<&TaxonomyNode> {
        self.ancestors
            .iter()
            .rev()
            .chain(std::iter::once(&self.node))
            .collect()
    }
}

impl TaxonomyTree {
    /// Resolve a node by id.
    pub fn resolve_by_id(&self, id: &NodeId) -> ClassiResult<ResolvedNode> {
        let idx = self.index_of(id).ok_or_else(|| self.not_found(Lookup::Id(id.clone())))?;
        Ok(self.resolve_index(idx))
    }

    /// Resolve a node by slug.
    ///
    /// Fails with [`TaxonomyError::Ambiguous`] when several attached nodes
    /// share the slug; callers disambiguate, e.g. with [`Self::resolve_slug_path`].
    pub fn resolve_by_slug(&self, slug: &str) -> ClassiResult<ResolvedNode> {
        match self.ids_for_slug(slug) {
            [] => Err(self.not_found(Lookup::Slug(slug.to_string()))),
            [id] => self.resolve_by_id(id),
            ids => Err(TaxonomyError::Ambiguous {
                taxonomy: self.kind(),
                slug: slug.to_string(),
                ids: ids.to_vec(),
            }
            .into()),
        }
    }

    /// Resolve a `/`-separated slug path such as `design/logo/logo-design`.
    ///
    /// Each segment is matched only among the children of the previous one,
    /// so slugs that collide in different branches still resolve.
    pub fn resolve_slug_path(&self, path: &str) -> ClassiResult<ResolvedNode> {
        let mut current: Option<usize> = None;

        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let candidates: &[usize] = match current {
                Some(idx) => self.child_indices(idx),
                None => self.root_indices(),
            };
            let matches: Vec<usize> = candidates
                .iter()
                .copied()
                .filter(|&idx| self.entry_at(idx).node().slug == segment)
                .collect();

            current = match matches.as_slice() {
                [idx] => Some(*idx),
                [] => return Err(self.not_found(Lookup::Slug(path.to_string()))),
                _ => {
                    return Err(TaxonomyError::Ambiguous {
                        taxonomy: self.kind(),
                        slug: segment.to_string(),
                        ids: matches
                            .iter()
                            .map(|&idx| self.entry_at(idx).id().clone())
                            .collect(),
                    }
                    .into())
                }
            };
        }

        match current {
            Some(idx) => Ok(self.resolve_index(idx)),
            None => Err(self.not_found(Lookup::Slug(path.to_string()))),
        }
    }

    /// Classify a node by its depth.
    pub fn level_of(&self, id: &NodeId) -> ClassiResult<Level> {
        self.entry(id)
            .map(|entry| entry.level())
            .ok_or_else(|| self.not_found(Lookup::Id(id.clone())))
    }

    /// Every root, resolved, in input order.
    pub fn roots(&self) -> Vec<ResolvedNode> {
        self.root_indices()
            .iter()
            .map(|&idx| self.resolve_index(idx))
            .collect()
    }

    /// The node's id plus all ids below it.
    ///
    /// This is what listing filters match against for "this category or
    /// anything under it".
    pub fn descendant_ids(&self, id: &NodeId) -> ClassiResult<BTreeSet<NodeId>> {
        let idx = self.index_of(id).ok_or_else(|| self.not_found(Lookup::Id(id.clone())))?;
        Ok(self.closure(idx))
    }

    /// Root-first chain ending with the node itself.
    pub fn breadcrumbs(&self, id: &NodeId) -> ClassiResult<Vec<TaxonomyNode>> {
        let entry = self
            .entry(id)
            .ok_or_else(|| self.not_found(Lookup::Id(id.clone())))?;

        let mut crumbs: Vec<TaxonomyNode> = entry
            .ancestor_ids()
            .iter()
            .rev()
            .filter_map(|ancestor| self.entry(ancestor).map(|e| e.node().clone()))
            .collect();
        crumbs.push(entry.node().clone());
        Ok(crumbs)
    }

    /// Root-first slugs joined with `/`, for URLs and sitemaps.
    pub fn slug_path(&self, id: &NodeId) -> ClassiResult<String> {
        let slugs: Vec<String> = self
            .breadcrumbs(id)?
            .into_iter()
            .map(|node| node.slug)
            .collect();
        Ok(slugs.join("/"))
    }

    fn resolve_index(&self, idx: usize) -> ResolvedNode {
        let entry = self.entry_at(idx);
        let ancestors = entry
            .ancestor_ids()
            .iter()
            .filter_map(|ancestor| self.entry(ancestor).map(|e| e.node().clone()))
            .collect();

        ResolvedNode {
            node: entry.node().clone(),
            level: entry.level(),
            depth: entry.depth(),
            ancestors,
            descendant_ids: self.closure(idx),
        }
    }

    /// Iterative walk below `idx`; the tree is acyclic and at most
    /// `max_depth` levels deep, so this is linear in the subtree size.
    fn closure(&self, idx: usize) -> BTreeSet<NodeId> {
        let mut ids = BTreeSet::new();
        let mut stack = vec![idx];
        while let Some(current) = stack.pop() {
            ids.insert(self.entry_at(current).id().clone());
            stack.extend_from_slice(self.child_indices(current));
        }
        ids
    }

    fn not_found(&self, lookup: Lookup) -> crate::ClassiError {
        TaxonomyError::NotFound {
            taxonomy: self.kind(),
            lookup,
        }
        .into()
    }
}

// =============================================================================
// TESTS
// =============================================================================
