//! Classi Core - Taxonomy Types, Tree Builder and Resolver
//!
//! Pure, synchronous taxonomy logic shared by navigation, breadcrumbs, SEO
//! metadata, sitemap generation and listing filters. Nothing in this crate
//! performs I/O; loading and caching live in `classi-storage`.

pub mod config;
pub mod error;
pub mod resolver;
pub mod tree;

pub use config::{ClassiConfig, TaxonomyConfig};
pub use error::{
    CacheError, ClassiError, ClassiResult, ConfigError, DataSourceError, Lookup, TaxonomyError,
};
pub use resolver::ResolvedNode;
pub use tree::{build, BuildWarning, TaxonomyTree, TreeEntry, TreeNode};

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Opaque node identifier, unique within one taxonomy.
///
/// Upstream rows use integer or string keys depending on the table, so the
/// identifier is kept as its textual form and never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(id) => Self(id),
            RawId::Signed(id) => Self(id.to_string()),
            RawId::Unsigned(id) => Self(id.to_string()),
        })
    }
}

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<i64> for NodeId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

// ============================================================================
// TAXONOMY KINDS
// ============================================================================

/// The named hierarchies the marketplace knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxonomyKind {
    /// Root / subgroup / subcategory.
    Categories,
    /// Town / quarter.
    Locations,
}

impl TaxonomyKind {
    pub const ALL: [TaxonomyKind; 2] = [TaxonomyKind::Categories, TaxonomyKind::Locations];

    /// Name used in cache keys, logs and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Categories => "categories",
            Self::Locations => "locations",
        }
    }

    /// Level names from the root downwards.
    pub fn levels(&self) -> &'static [Level] {
        match self {
            Self::Categories => &[Level::Root, Level::Subgroup, Level::Subcategory],
            Self::Locations => &[Level::Town, Level::Quarter],
        }
    }

    /// Hard ceiling on the number of levels a built tree may contain.
    pub fn max_depth(&self) -> usize {
        self.levels().len()
    }

    /// Classify a zero-based depth, or `None` past the ceiling.
    pub fn level_at(&self, depth: usize) -> Option<Level> {
        self.levels().get(depth).copied()
    }
}

impl fmt::Display for TaxonomyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaxonomyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "categories" => Ok(Self::Categories),
            "locations" => Ok(Self::Locations),
            _ => Err(ConfigError::UnknownTaxonomy {
                name: s.to_string(),
            }),
        }
    }
}

/// Position of a node within its taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Root,
    Subgroup,
    Subcategory,
    Town,
    Quarter,
}

// ============================================================================
// NODES
// ============================================================================

/// One row of a flat taxonomy snapshot.
///
/// Extra upstream columns are ignored on deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxonomyNode {
    pub id: NodeId,
    pub name: String,
    pub slug: String,
    #[serde(default, alias = "parent_id", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
}

impl TaxonomyNode {
    /// Create a root node.
    pub fn root(id: impl Into<NodeId>, name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            slug: slug.into(),
            parent_id: None,
        }
    }

    /// Create a node under `parent_id`.
    pub fn child(
        id: impl Into<NodeId>,
        parent_id: impl Into<NodeId>,
        name: impl Into<String>,
        slug: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            slug: slug.into(),
            parent_id: Some(parent_id.into()),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_conversions() {
        assert_eq!(NodeId::from(42i64), NodeId::from("42"));
        assert_eq!(NodeId::from(7u64).as_str(), "7");
        assert_eq!(NodeId::new("abc").to_string(), "abc");
    }

    #[test]
    fn test_taxonomy_kind_from_str() {
        assert_eq!("categories".parse::<TaxonomyKind>().ok(), Some(TaxonomyKind::Categories));
        assert_eq!(" Locations ".parse::<TaxonomyKind>().ok(), Some(TaxonomyKind::Locations));

        let err = "brands".parse::<TaxonomyKind>();
        assert!(matches!(err, Err(ConfigError::UnknownTaxonomy { name }) if name == "brands"));
    }

    #[test]
    fn test_level_at_respects_ceiling() {
        assert_eq!(TaxonomyKind::Categories.level_at(2), Some(Level::Subcategory));
        assert_eq!(TaxonomyKind::Categories.level_at(3), None);
        assert_eq!(TaxonomyKind::Locations.level_at(1), Some(Level::Quarter));
        assert_eq!(TaxonomyKind::Locations.level_at(2), None);
    }

    #[test]
    fn test_node_deserializes_both_parent_spellings() {
        let camel: TaxonomyNode =
            serde_json::from_str(r#"{"id":"2","name":"Logo","slug":"logo","parentId":"1","extra":true}"#)
                .unwrap();
        let snake: TaxonomyNode =
            serde_json::from_str(r#"{"id":"2","name":"Logo","slug":"logo","parent_id":"1"}"#)
                .unwrap();
        assert_eq!(camel, snake);
        assert_eq!(camel.parent_id, Some(NodeId::from("1")));

        let root: TaxonomyNode =
            serde_json::from_str(r#"{"id":1,"name":"Design","slug":"design"}"#).unwrap();
        assert!(root.is_root());
        assert_eq!(root.id, NodeId::from(1i64));
    }
}
