//! Error types for classi operations

use crate::{NodeId, TaxonomyKind};
use std::fmt;
use thiserror::Error;

/// What a failed lookup was searching for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Id(NodeId),
    Slug(String),
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id {}", id),
            Self::Slug(slug) => write!(f, "slug '{}'", slug),
        }
    }
}

/// Lookup errors against a built taxonomy tree.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaxonomyError {
    #[error("No node with {lookup} in {taxonomy}")]
    NotFound {
        taxonomy: TaxonomyKind,
        lookup: Lookup,
    },

    #[error("Slug '{slug}' is ambiguous in {taxonomy}: shared by {ids:?}")]
    Ambiguous {
        taxonomy: TaxonomyKind,
        slug: String,
        ids: Vec<NodeId>,
    },
}

/// Errors raised by the external store that supplies flat node lists.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DataSourceError {
    #[error("Data source unavailable for {taxonomy}: {reason}")]
    Unavailable {
        taxonomy: TaxonomyKind,
        reason: String,
    },

    #[error("Malformed {taxonomy} snapshot: {reason}")]
    Malformed {
        taxonomy: TaxonomyKind,
        reason: String,
    },
}

/// Cache bookkeeping errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache lock poisoned")]
    LockPoisoned,

    #[error("Fetch task for '{key}' did not complete: {reason}")]
    FetchTaskFailed { key: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unknown taxonomy: {name}")]
    UnknownTaxonomy { name: String },
}

/// Master error type for all classi errors.
///
/// Every variant is `Clone` because one fetch result is handed to every
/// coalesced caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClassiError {
    #[error("Taxonomy error: {0}")]
    Taxonomy(#[from] TaxonomyError),

    #[error("Data source error: {0}")]
    DataSource(#[from] DataSourceError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl ClassiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Taxonomy(TaxonomyError::NotFound { .. }))
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Taxonomy(TaxonomyError::Ambiguous { .. }))
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::DataSource(DataSourceError::Unavailable { .. }))
    }
}

/// Result type alias for classi operations.
pub type ClassiResult<T> = Result<T, ClassiError>;

// =============================================================================
// TESTS
// =============================================================================
