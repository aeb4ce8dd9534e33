//! Configuration types

use crate::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default staleness window for every taxonomy.
pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(3600);

/// Per-taxonomy cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyConfig {
    /// How long a built tree is served without triggering a refresh.
    ///
    /// A longer window means less upstream load but a longer delay before an
    /// admin edit becomes visible (unless the taxonomy is invalidated).
    #[serde(rename = "stale_time_secs", with = "duration_secs")]
    pub stale_time: Duration,
}

impl TaxonomyConfig {
    pub fn new(stale_time: Duration) -> Self {
        Self { stale_time }
    }
}

impl Default for TaxonomyConfig {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_TIME)
    }
}

/// Master configuration struct.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClassiConfig {
    #[serde(default)]
    pub categories: TaxonomyConfig,
    #[serde(default)]
    pub locations: TaxonomyConfig,
}

impl ClassiConfig {
    /// Use the same staleness window for every taxonomy.
    pub fn uniform(stale_time: Duration) -> Self {
        Self {
            categories: TaxonomyConfig::new(stale_time),
            locations: TaxonomyConfig::new(stale_time),
        }
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `CLASSI_CATEGORIES_STALE_SECS`: stale window for categories (default: 3600)
    /// - `CLASSI_LOCATIONS_STALE_SECS`: stale window for locations (default: 3600)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            categories: TaxonomyConfig::new(
                std::env::var("CLASSI_CATEGORIES_STALE_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.categories.stale_time),
            ),
            locations: TaxonomyConfig::new(
                std::env::var("CLASSI_LOCATIONS_STALE_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.locations.stale_time),
            ),
        }
    }

    pub fn taxonomy(&self, kind: TaxonomyKind) -> &TaxonomyConfig {
        match kind {
            TaxonomyKind::Categories => &self.categories,
            TaxonomyKind::Locations => &self.locations,
        }
    }

    pub fn stale_time(&self, kind: TaxonomyKind) -> Duration {
        self.taxonomy(kind).stale_time
    }

    /// Validate the configuration.
    /// Returns Ok(()) if valid, Err(ClassiError::Config) if invalid.
    ///
    /// Every staleness window must be positive.
    pub fn validate(&self) -> ClassiResult<()> {
        for kind in TaxonomyKind::ALL {
            let stale_time = self.stale_time(kind);
            if stale_time.is_zero() {
                return Err(ClassiError::Config(ConfigError::InvalidValue {
                    field: format!("{}.stale_time", kind),
                    value: format!("{:?}", stale_time),
                    reason: "stale_time must be positive".to_string(),
                }));
            }
        }

        Ok(())
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

// =============================================================================
// TESTS
// =============================================================================
