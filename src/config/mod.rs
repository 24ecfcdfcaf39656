//! Configuration for reporting repositories.

/// Which underlying computation schema a repository uses.
///
/// Both schemas must produce identical results for the same raw dataset;
/// `V2` reads pre-aggregated per-patient-per-month rows instead of raw
/// event tables. The version is part of every cache key so values computed
/// under one schema are never read back under the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaVersion {
    /// Legacy schema computing directly against raw event tables
    V1,
    /// Schema reading from the materialized monthly-states view
    V2,
}

impl SchemaVersion {
    /// Short tag used in cache keys
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V2 => "v2",
        }
    }
}

/// Configuration for a `Repository` instance
///
/// The schema choice is fixed for the lifetime of the repository; the cache
/// bypass flag is read at every batch fetch, so toggling it mid-request
/// affects subsequent accessor calls.
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    /// Use the materialized-view-backed schema instead of the legacy one
    pub use_schema_v2: bool,
    /// Force every batch fetch to recompute and overwrite cache entries
    pub bypass_cache: bool,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            use_schema_v2: false,
            bypass_cache: false,
        }
    }
}

impl RepositoryConfig {
    /// Resolved schema version for this configuration
    #[must_use]
    pub const fn schema_version(&self) -> SchemaVersion {
        if self.use_schema_v2 {
            SchemaVersion::V2
        } else {
            SchemaVersion::V1
        }
    }
}
