//! Taxonomy tree builder.
//!
//! Turns a flat, self-referencing node snapshot into an immutable forest with
//! bounded depth plus lookup indices. Upstream data is not trusted: orphans,
//! cycles, depth violations and duplicate ids are excluded and reported as
//! [`BuildWarning`]s instead of failing the build.

use crate::{Level, NodeId, TaxonomyKind, TaxonomyNode};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// WARNINGS
// ============================================================================

/// A data-quality problem found while building a tree.
///
/// Every input node left out of the tree is named by exactly one warning.
/// `DuplicateSlug` excludes nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuildWarning {
    /// The node points at a parent that is not in the snapshot.
    Orphan { id: NodeId, parent_id: NodeId },

    /// These nodes are their own transitive ancestors.
    Cycle { ids: Vec<NodeId> },

    /// Attaching the node would put it below the deepest allowed level.
    DepthExceeded {
        id: NodeId,
        depth: usize,
        max_depth: usize,
    },

    /// The node sits below another excluded node.
    Detached {
        id: NodeId,
        excluded_ancestor: NodeId,
    },

    /// A second row reused an id; the first row wins.
    DuplicateId { id: NodeId },

    /// Several attached nodes share one slug.
    DuplicateSlug { slug: String, ids: Vec<NodeId> },
}

impl BuildWarning {
    /// Input nodes this warning removed from the tree.
    pub fn excluded_ids(&self) -> Vec<&NodeId> {
        match self {
            Self::Orphan { id, .. }
            | Self::DepthExceeded { id, .. }
            | Self::Detached { id, .. }
            | Self::DuplicateId { id } => vec![id],
            Self::Cycle { ids } => ids.iter().collect(),
            Self::DuplicateSlug { .. } => Vec::new(),
        }
    }
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Orphan { id, parent_id } => {
                write!(f, "node {} references missing parent {}", id, parent_id)
            }
            Self::Cycle { ids } => {
                let ids: Vec<&str> = ids.iter().map(NodeId::as_str).collect();
                write!(f, "cycle through nodes [{}]", ids.join(" -> "))
            }
            Self::DepthExceeded {
                id,
                depth,
                max_depth,
            } => write!(
                f,
                "node {} would be on level {} but only {} levels are allowed",
                id,
                depth + 1,
                max_depth
            ),
            Self::Detached {
                id,
                excluded_ancestor,
            } => write!(f, "node {} is below excluded node {}", id, excluded_ancestor),
            Self::DuplicateId { id } => write!(f, "duplicate id {}; later row dropped", id),
            Self::DuplicateSlug { slug, ids } => {
                let ids: Vec<&str> = ids.iter().map(NodeId::as_str).collect();
                write!(f, "slug '{}' shared by nodes [{}]", slug, ids.join(", "))
            }
        }
    }
}

// ============================================================================
// TREE
// ============================================================================

/// One attached node plus its position in the tree.
#[derive(Debug, Clone)]
pub struct TreeEntry {
    node: TaxonomyNode,
    depth: usize,
    level: Level,
    parent: Option<usize>,
    children: Vec<usize>,
    /// Immediate parent first, root last.
    ancestor_ids: Vec<NodeId>,
}

impl TreeEntry {
    pub fn node(&self) -> &TaxonomyNode {
        &self.node
    }

    pub fn id(&self) -> &NodeId {
        &self.node.id
    }

    /// Zero for roots.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn level(&self) -> Level {
        self.level
    }

    /// Ancestor ids ordered from the immediate parent up to the root.
    pub fn ancestor_ids(&self) -> &[NodeId] {
        &self.ancestor_ids
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

/// Owned nested view used for navigation menus and footers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    pub node: TaxonomyNode,
    pub level: Level,
    pub children: Vec<TreeNode>,
}

/// An immutable, validated taxonomy.
///
/// Entries are stored in depth-first pre-order; children keep the order in
/// which they appeared in the input snapshot.
#[derive(Debug, Clone)]
pub struct TaxonomyTree {
    kind: TaxonomyKind,
    entries: Vec<TreeEntry>,
    roots: Vec<usize>,
    by_id: HashMap<NodeId, usize>,
    by_slug: HashMap<String, Vec<NodeId>>,
    warnings: Vec<BuildWarning>,
}

/// Build a tree and hand back the warnings separately.
pub fn build(kind: TaxonomyKind, nodes: Vec<TaxonomyNode>) -> (TaxonomyTree, Vec<BuildWarning>) {
    let tree = TaxonomyTree::build(kind, nodes);
    let warnings = tree.warnings.clone();
    (tree, warnings)
}

impl TaxonomyTree {
    /// Build a tree from a flat snapshot. Never fails; see [`BuildWarning`].
    pub fn build(kind: TaxonomyKind, nodes: Vec<TaxonomyNode>) -> Self {
        Builder::new(kind, nodes).finish()
    }

    /// A tree with no nodes.
    pub fn empty(kind: TaxonomyKind) -> Self {
        Self::build(kind, Vec::new())
    }

    pub fn kind(&self) -> TaxonomyKind {
        self.kind
    }

    /// Number of attached nodes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn warnings(&self) -> &[BuildWarning] {
        &self.warnings
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn entry(&self, id: &NodeId) -> Option<&TreeEntry> {
        self.by_id.get(id).map(|&idx| &self.entries[idx])
    }

    /// Ids of every attached node using `slug`, in tree order.
    pub fn ids_for_slug(&self, slug: &str) -> &[NodeId] {
        self.by_slug.get(slug).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn root_entries(&self) -> impl Iterator<Item = &TreeEntry> + '_ {
        self.roots.iter().map(move |&idx| &self.entries[idx])
    }

    /// Direct children of `id`; empty when the node is unknown or a leaf.
    pub fn children_of(&self, id: &NodeId) -> impl Iterator<Item = &TreeEntry> + '_ {
        let children: &[usize] = self
            .by_id
            .get(id)
            .map(|&idx| self.entries[idx].children.as_slice())
            .unwrap_or(&[]);
        children.iter().map(move |&idx| &self.entries[idx])
    }

    pub fn parent_of(&self, id: &NodeId) -> Option<&TreeEntry> {
        let idx = *self.by_id.get(id)?;
        self.entries[idx].parent.map(|parent| &self.entries[parent])
    }

    /// Depth-first pre-order walk over every attached node.
    pub fn iter(&self) -> impl Iterator<Item = &TreeEntry> + '_ {
        self.entries.iter()
    }

    /// Owned nested copy of the whole forest.
    pub fn forest(&self) -> Vec<TreeNode> {
        self.roots.iter().map(|&idx| self.subtree(idx)).collect()
    }

    fn subtree(&self, idx: usize) -> TreeNode {
        let entry = &self.entries[idx];
        TreeNode {
            node: entry.node.clone(),
            level: entry.level,
            children: entry
                .children
                .iter()
                .map(|&child| self.subtree(child))
                .collect(),
        }
    }

    pub(crate) fn entry_at(&self, idx: usize) -> &TreeEntry {
        &self.entries[idx]
    }

    pub(crate) fn index_of(&self, id: &NodeId) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    pub(crate) fn child_indices(&self, idx: usize) -> &[usize] {
        &self.entries[idx].children
    }

    pub(crate) fn root_indices(&self) -> &[usize] {
        &self.roots
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Why an unattached node walk stopped.
enum WalkEnd {
    /// The last node on the path names a parent that does not exist.
    Orphan,
    /// The path re-entered itself at this position.
    Cycle(usize),
    /// The path reached a node that was already excluded under this anchor.
    Excluded(NodeId),
}

struct Builder {
    kind: TaxonomyKind,
    input: Vec<TaxonomyNode>,
    position: HashMap<NodeId, usize>,
    /// Input index -> input indices of its children, in input order.
    children: Vec<Vec<usize>>,
    /// Input index -> exclusion anchor, for nodes already left out.
    excluded: Vec<Option<NodeId>>,
    attached: Vec<bool>,
    entries: Vec<TreeEntry>,
    roots: Vec<usize>,
    warnings: Vec<BuildWarning>,
}

impl Builder {
    fn new(kind: TaxonomyKind, nodes: Vec<TaxonomyNode>) -> Self {
        let mut warnings = Vec::new();
        let mut input = Vec::with_capacity(nodes.len());
        let mut position = HashMap::with_capacity(nodes.len());

        for node in nodes {
            if position.contains_key(&node.id) {
                warnings.push(BuildWarning::DuplicateId { id: node.id });
                continue;
            }
            position.insert(node.id.clone(), input.len());
            input.push(node);
        }

        let mut children = vec![Vec::new(); input.len()];
        for (idx, node) in input.iter().enumerate() {
            if let Some(parent) = node.parent_id.as_ref().and_then(|p| position.get(p)) {
                // A self-parented node is left unlinked and caught as a cycle.
                if *parent != idx {
                    children[*parent].push(idx);
                }
            }
        }

        let len = input.len();
        Self {
            kind,
            input,
            position,
            children,
            excluded: vec![None; len],
            attached: vec![false; len],
            entries: Vec::with_capacity(len),
            roots: Vec::new(),
            warnings,
        }
    }

    fn finish(mut self) -> TaxonomyTree {
        let roots: Vec<usize> = (0..self.input.len())
            .filter(|&idx| self.input[idx].is_root())
            .collect();
        for root in roots {
            self.attach_from(root);
        }

        for idx in 0..self.input.len() {
            if !self.attached[idx] && self.excluded[idx].is_none() {
                self.exclude_unreached(idx);
            }
        }

        let mut by_id = HashMap::with_capacity(self.entries.len());
        let mut by_slug: HashMap<String, Vec<NodeId>> = HashMap::new();
        let mut slug_order = Vec::new();
        for (idx, entry) in self.entries.iter().enumerate() {
            by_id.insert(entry.node.id.clone(), idx);
            let ids = by_slug.entry(entry.node.slug.clone()).or_default();
            if ids.is_empty() {
                slug_order.push(entry.node.slug.clone());
            }
            ids.push(entry.node.id.clone());
        }
        for slug in slug_order {
            if let Some(ids) = by_slug.get(&slug) {
                if ids.len() > 1 {
                    self.warnings.push(BuildWarning::DuplicateSlug {
                        slug,
                        ids: ids.clone(),
                    });
                }
            }
        }

        TaxonomyTree {
            kind: self.kind,
            entries: self.entries,
            roots: self.roots,
            by_id,
            by_slug,
            warnings: self.warnings,
        }
    }

    /// Attach `root` and everything reachable below it, depth-first.
    fn attach_from(&mut self, root: usize) {
        let mut stack: Vec<(usize, Option<usize>, usize)> = vec![(root, None, 0)];

        while let Some((input_idx, parent, depth)) = stack.pop() {
            let Some(level) = self.kind.level_at(depth) else {
                let id = self.input[input_idx].id.clone();
                self.warnings.push(BuildWarning::DepthExceeded {
                    id: id.clone(),
                    depth,
                    max_depth: self.kind.max_depth(),
                });
                self.excluded[input_idx] = Some(id.clone());
                self.detach_below(input_idx, &id);
                continue;
            };

            let ancestor_ids = match parent {
                Some(parent_idx) => {
                    let parent_entry: &TreeEntry = &self.entries[parent_idx];
                    let mut ids = Vec::with_capacity(parent_entry.ancestor_ids.len() + 1);
                    ids.push(parent_entry.node.id.clone());
                    ids.extend(parent_entry.ancestor_ids.iter().cloned());
                    ids
                }
                None => Vec::new(),
            };

            let entry_idx = self.entries.len();
            self.entries.push(TreeEntry {
                node: self.input[input_idx].clone(),
                depth,
                level,
                parent,
                children: Vec::new(),
                ancestor_ids,
            });
            self.attached[input_idx] = true;
            match parent {
                Some(parent_idx) => self.entries[parent_idx].children.push(entry_idx),
                None => self.roots.push(entry_idx),
            }

            // Reverse so the first child in input order is popped first.
            for &child in self.children[input_idx].iter().rev() {
                stack.push((child, Some(entry_idx), depth + 1));
            }
        }
    }

    /// Exclude every input node below `input_idx`, anchored on `anchor`.
    fn detach_below(&mut self, input_idx: usize, anchor: &NodeId) {
        let mut stack: Vec<usize> = self.children[input_idx].clone();
        while let Some(idx) = stack.pop() {
            if self.attached[idx] || self.excluded[idx].is_some() {
                continue;
            }
            self.exclude_detached(idx, anchor);
            stack.extend(self.children[idx].iter().copied());
        }
    }

    fn exclude_detached(&mut self, idx: usize, anchor: &NodeId) {
        self.warnings.push(BuildWarning::Detached {
            id: self.input[idx].id.clone(),
            excluded_ancestor: anchor.clone(),
        });
        self.excluded[idx] = Some(anchor.clone());
    }

    /// Classify a node no root reaches by walking its parent chain.
    fn exclude_unreached(&mut self, start: usize) {
        let mut path: Vec<usize> = Vec::new();
        let mut on_path: HashMap<usize, usize> = HashMap::new();
        let mut current = start;

        let end = loop {
            if let Some(anchor) = &self.excluded[current] {
                break WalkEnd::Excluded(anchor.clone());
            }
            if let Some(&pos) = on_path.get(&current) {
                break WalkEnd::Cycle(pos);
            }
            on_path.insert(current, path.len());
            path.push(current);

            let parent = self.input[current]
                .parent_id
                .as_ref()
                .and_then(|parent_id| self.position.get(parent_id).copied());
            match parent {
                Some(parent) => current = parent,
                // Roots are always attached, so a missing parent here is an orphan.
                None => break WalkEnd::Orphan,
            }
        };

        match end {
            WalkEnd::Orphan => {
                let Some(&orphan) = path.last() else {
                    return;
                };
                let node = &self.input[orphan];
                let anchor = node.id.clone();
                self.warnings.push(BuildWarning::Orphan {
                    id: anchor.clone(),
                    parent_id: node.parent_id.clone().unwrap_or_else(|| anchor.clone()),
                });
                self.excluded[orphan] = Some(anchor.clone());
                for &idx in path[..path.len() - 1].iter().rev() {
                    self.exclude_detached(idx, &anchor);
                }
            }
            WalkEnd::Cycle(pos) => {
                let members = &path[pos..];
                let ids: Vec<NodeId> = members
                    .iter()
                    .map(|&idx| self.input[idx].id.clone())
                    .collect();
                for &idx in members {
                    self.excluded[idx] = Some(self.input[idx].id.clone());
                }
                let anchor = ids[0].clone();
                self.warnings.push(BuildWarning::Cycle { ids });
                for &idx in path[..pos].iter().rev() {
                    self.exclude_detached(idx, &anchor);
                }
            }
            WalkEnd::Excluded(anchor) => {
                for &idx in path.iter().rev() {
                    self.exclude_detached(idx, &anchor);
                }
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn design_categories() -> Vec<TaxonomyNode> {
        vec![
            TaxonomyNode::root(1i64, "Design", "design"),
            TaxonomyNode::child(2i64, 1i64, "Logo", "logo"),
            TaxonomyNode::child(3i64, 2i64, "Logo design", "logo-design"),
        ]
    }

    fn excluded_count(warnings: &[BuildWarning]) -> usize {
        warnings.iter().map(|w| w.excluded_ids().len()).sum()
    }

    #[test]
    fn test_build_simple_chain() {
        let tree = TaxonomyTree::build(TaxonomyKind::Categories, design_categories());

        assert_eq!(tree.len(), 3);
        assert!(tree.warnings().is_empty());
        assert_eq!(tree.root_entries().count(), 1);

        let leaf = tree.entry(&NodeId::from(3i64)).unwrap();
        assert_eq!(leaf.depth(), 2);
        assert_eq!(leaf.level(), Level::Subcategory);
        assert_eq!(
            leaf.ancestor_ids(),
            &[NodeId::from(2i64), NodeId::from(1i64)]
        );
        assert_eq!(tree.parent_of(leaf.id()).unwrap().id(), &NodeId::from(2i64));
    }

    #[test]
    fn test_children_follow_input_order() {
        let nodes = vec![
            TaxonomyNode::root("r", "Root", "root"),
            TaxonomyNode::child("z", "r", "Zebra", "zebra"),
            TaxonomyNode::child("a", "r", "Apple", "apple"),
            TaxonomyNode::child("m", "r", "Mango", "mango"),
        ];
        let tree = TaxonomyTree::build(TaxonomyKind::Categories, nodes);

        let order: Vec<&str> = tree
            .children_of(&NodeId::from("r"))
            .map(|e| e.id().as_str())
            .collect();
        assert_eq!(order, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_child_listed_before_parent_still_attaches() {
        let nodes = vec![
            TaxonomyNode::child("c", "p", "Child", "child"),
            TaxonomyNode::root("p", "Parent", "parent"),
        ];
        let tree = TaxonomyTree::build(TaxonomyKind::Locations, nodes);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree.entry(&NodeId::from("c")).unwrap().level(), Level::Quarter);
    }

    #[test]
    fn test_orphan_excluded_with_descendants() {
        let mut nodes = design_categories();
        nodes.push(TaxonomyNode::child(10i64, 99i64, "Lost", "lost"));
        nodes.push(TaxonomyNode::child(11i64, 10i64, "Lost child", "lost-child"));

        let (tree, warnings) = build(TaxonomyKind::Categories, nodes);

        assert_eq!(tree.len(), 3);
        assert!(!tree.contains(&NodeId::from(10i64)));
        assert!(warnings.contains(&BuildWarning::Orphan {
            id: NodeId::from(10i64),
            parent_id: NodeId::from(99i64),
        }));
        assert!(warnings.contains(&BuildWarning::Detached {
            id: NodeId::from(11i64),
            excluded_ancestor: NodeId::from(10i64),
        }));
    }

    #[test]
    fn test_cycle_excluded_rest_built() {
        let mut nodes = design_categories();
        nodes.push(TaxonomyNode::child("a", "b", "A", "a"));
        nodes.push(TaxonomyNode::child("b", "a", "B", "b"));
        nodes.push(TaxonomyNode::child("hanger", "a", "Hanger", "hanger"));

        let (tree, warnings) = build(TaxonomyKind::Categories, nodes);

        assert_eq!(tree.len(), 3);
        let cycle = warnings
            .iter()
            .find_map(|w| match w {
                BuildWarning::Cycle { ids } => Some(ids.clone()),
                _ => None,
            })
            .expect("cycle warning");
        assert_eq!(cycle.len(), 2);
        assert!(cycle.contains(&NodeId::from("a")));
        assert!(cycle.contains(&NodeId::from("b")));
        assert!(warnings.iter().any(|w| matches!(
            w,
            BuildWarning::Detached { id, .. } if id == &NodeId::from("hanger")
        )));
        assert_eq!(excluded_count(&warnings), 3);
    }

    #[test]
    fn test_self_parent_is_cycle() {
        let nodes = vec![TaxonomyNode::child("x", "x", "Self", "self")];
        let (tree, warnings) = build(TaxonomyKind::Categories, nodes);

        assert!(tree.is_empty());
        assert_eq!(
            warnings,
            vec![BuildWarning::Cycle {
                ids: vec![NodeId::from("x")]
            }]
        );
    }

    #[test]
    fn test_depth_ceiling_truncates_subtree() {
        let mut nodes = design_categories();
        nodes.push(TaxonomyNode::child(4i64, 3i64, "Too deep", "too-deep"));
        nodes.push(TaxonomyNode::child(5i64, 4i64, "Deeper", "deeper"));

        let (tree, warnings) = build(TaxonomyKind::Categories, nodes);

        assert_eq!(tree.len(), 3);
        assert!(warnings.contains(&BuildWarning::DepthExceeded {
            id: NodeId::from(4i64),
            depth: 3,
            max_depth: 3,
        }));
        assert!(warnings.contains(&BuildWarning::Detached {
            id: NodeId::from(5i64),
            excluded_ancestor: NodeId::from(4i64),
        }));
    }

    #[test]
    fn test_locations_allow_two_levels() {
        let nodes = vec![
            TaxonomyNode::root("sofia", "Sofia", "sofia"),
            TaxonomyNode::child("lozenets", "sofia", "Lozenets", "lozenets"),
            TaxonomyNode::child("street", "lozenets", "Street", "street"),
        ];
        let (tree, warnings) = build(TaxonomyKind::Locations, nodes);

        assert_eq!(tree.len(), 2);
        assert_eq!(warnings.len(), 1);
        assert!(matches!(warnings[0], BuildWarning::DepthExceeded { .. }));
    }

    #[test]
    fn test_duplicate_id_first_row_wins() {
        let nodes = vec![
            TaxonomyNode::root(1i64, "Design", "design"),
            TaxonomyNode::root(1i64, "Design again", "design-again"),
        ];
        let (tree, warnings) = build(TaxonomyKind::Categories, nodes);

        assert_eq!(tree.len(), 1);
        assert_eq!(tree.entry(&NodeId::from(1i64)).unwrap().node().slug, "design");
        assert_eq!(
            warnings,
            vec![BuildWarning::DuplicateId {
                id: NodeId::from(1i64)
            }]
        );
    }

    #[test]
    fn test_duplicate_slug_flagged_not_dropped() {
        let nodes = vec![
            TaxonomyNode::root(1i64, "Design", "design"),
            TaxonomyNode::root(2i64, "Music", "music"),
            TaxonomyNode::child(3i64, 1i64, "Other", "other"),
            TaxonomyNode::child(4i64, 2i64, "Other", "other"),
        ];
        let (tree, warnings) = build(TaxonomyKind::Categories, nodes);

        assert_eq!(tree.len(), 4);
        assert_eq!(
            tree.ids_for_slug("other"),
            &[NodeId::from(3i64), NodeId::from(4i64)]
        );
        assert_eq!(
            warnings,
            vec![BuildWarning::DuplicateSlug {
                slug: "other".to_string(),
                ids: vec![NodeId::from(3i64), NodeId::from(4i64)],
            }]
        );
    }

    #[test]
    fn test_iter_is_preorder() {
        let nodes = vec![
            TaxonomyNode::root("a", "A", "a"),
            TaxonomyNode::root("b", "B", "b"),
            TaxonomyNode::child("a1", "a", "A1", "a1"),
            TaxonomyNode::child("b1", "b", "B1", "b1"),
            TaxonomyNode::child("a2", "a", "A2", "a2"),
        ];
        let tree = TaxonomyTree::build(TaxonomyKind::Categories, nodes);

        let order: Vec<&str> = tree.iter().map(|e| e.id().as_str()).collect();
        assert_eq!(order, vec!["a", "a1", "a2", "b", "b1"]);
    }

    #[test]
    fn test_forest_nests_children() {
        let tree = TaxonomyTree::build(TaxonomyKind::Categories, design_categories());
        let forest = tree.forest();

        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].level, Level::Root);
        assert_eq!(forest[0].children.len(), 1);
        assert_eq!(forest[0].children[0].children[0].node.slug, "logo-design");
        assert!(forest[0].children[0].children[0].children.is_empty());
    }

    #[test]
    fn test_warning_display() {
        let warning = BuildWarning::Cycle {
            ids: vec![NodeId::from("a"), NodeId::from("b")],
        };
        assert_eq!(warning.to_string(), "cycle through nodes [a -> b]");
    }

    // ------------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------------

    /// Well-formed snapshot: each node's parent is an earlier node whose depth
    /// leaves room below the ceiling. Emitted in shuffled order.
    fn arb_valid_nodes(kind: TaxonomyKind) -> impl Strategy<Value = Vec<TaxonomyNode>> {
        let max_depth = kind.max_depth();
        prop::collection::vec(any::<prop::sample::Index>(), 1..40)
            .prop_flat_map(move |picks| {
                let mut depths: Vec<usize> = Vec::with_capacity(picks.len());
                let mut nodes = Vec::with_capacity(picks.len());
                for (i, pick) in picks.iter().enumerate() {
                    let candidates: Vec<usize> =
                        (0..i).filter(|&j| depths[j] + 1 < max_depth).collect();
                    // Every fourth node is a root so forests appear too.
                    if candidates.is_empty() || i % 4 == 0 {
                        depths.push(0);
                        nodes.push(TaxonomyNode::root(i as u64, format!("N{}", i), format!("n-{}", i)));
                    } else {
                        let parent = candidates[pick.index(candidates.len())];
                        depths.push(depths[parent] + 1);
                        nodes.push(TaxonomyNode::child(
                            i as u64,
                            parent as u64,
                            format!("N{}", i),
                            format!("n-{}", i),
                        ));
                    }
                }
                Just(nodes).prop_shuffle()
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Valid input loses nothing and warns about nothing.
        #[test]
        fn prop_valid_input_keeps_every_node(nodes in arb_valid_nodes(TaxonomyKind::Categories)) {
            let count = nodes.len();
            let (tree, warnings) = build(TaxonomyKind::Categories, nodes);

            prop_assert_eq!(tree.len(), count);
            prop_assert!(warnings.is_empty(), "unexpected warnings: {:?}", warnings);
        }

        /// Computed ancestors equal the parentId chain of the input.
        #[test]
        fn prop_ancestors_match_parent_chain(nodes in arb_valid_nodes(TaxonomyKind::Categories)) {
            let parents: HashMap<NodeId, Option<NodeId>> = nodes
                .iter()
                .map(|n| (n.id.clone(), n.parent_id.clone()))
                .collect();
            let tree = TaxonomyTree::build(TaxonomyKind::Categories, nodes);

            for entry in tree.iter() {
                let mut expected = Vec::new();
                let mut cursor = parents.get(entry.id()).cloned().flatten();
                while let Some(parent) = cursor {
                    cursor = parents.get(&parent).cloned().flatten();
                    expected.push(parent);
                }
                prop_assert_eq!(entry.ancestor_ids(), expected.as_slice());
            }
        }

        /// With arbitrary parent pointers, attached + excluded always equals input.
        #[test]
        fn prop_every_node_accounted_for(
            parents in prop::collection::vec(prop::option::of(0u64..30), 0..30)
        ) {
            let nodes: Vec<TaxonomyNode> = parents
                .iter()
                .enumerate()
                .map(|(i, parent)| TaxonomyNode {
                    id: NodeId::from(i as u64),
                    name: format!("N{}", i),
                    slug: format!("n-{}", i),
                    parent_id: parent.map(NodeId::from),
                })
                .collect();
            let count = nodes.len();
            let (tree, warnings) = build(TaxonomyKind::Categories, nodes);

            prop_assert_eq!(tree.len() + excluded_count(&warnings), count);
            for entry in tree.iter() {
                prop_assert!(entry.depth() < TaxonomyKind::Categories.max_depth());
            }
        }
    }
}
