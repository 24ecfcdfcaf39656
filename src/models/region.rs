//! Region node and materialized path
//!
//! A region's `path` encodes its full ancestor chain as a dot-separated
//! sequence of labels down to the node itself. Ancestor/descendant queries
//! are explicit prefix-containment checks over these label sequences, so
//! no specialized hierarchical datatype is needed in the backing store.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::types::RegionType;

/// Maximum byte length of a single path label
pub const MAX_LABEL_LENGTH: usize = 255;

/// Materialized path: dot-separated ancestor labels down to self
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionPath(String);

impl RegionPath {
    /// Build a single-label path
    #[must_use]
    pub fn root(label: &str) -> Self {
        Self(label.to_string())
    }

    /// Extend this path with a child label
    #[must_use]
    pub fn child(&self, label: &str) -> Self {
        Self(format!("{}.{label}", self.0))
    }

    /// The node's own label (last segment)
    #[must_use]
    pub fn label(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    /// Labels from root to self
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// Number of labels, i.e. depth + 1
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels().count()
    }

    /// Whether the path has no labels (never true for a constructed path)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `self` is an ancestor of `other` or equal to it.
    /// Containment is by whole labels, not raw string prefix.
    #[must_use]
    pub fn is_self_or_ancestor_of(&self, other: &Self) -> bool {
        other.0 == self.0 || other.0.starts_with(&format!("{}.", self.0))
    }

    /// Whether `self` is a strict descendant of `other`
    #[must_use]
    pub fn is_descendant_of(&self, other: &Self) -> bool {
        self.0 != other.0 && other.is_self_or_ancestor_of(self)
    }

    /// Raw dot-separated representation
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Polymorphic reference to the domain entity backing a region
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    /// An underlying facility
    Facility(String),
    /// An underlying organization
    Organization(String),
}

impl SourceRef {
    /// Facility id, if this source is a facility
    #[must_use]
    pub fn facility_id(&self) -> Option<&str> {
        match self {
            Self::Facility(id) => Some(id),
            Self::Organization(_) => None,
        }
    }
}

/// One node in the organizational tree
#[derive(Debug, Clone)]
pub struct RegionNode {
    /// Unique node identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Unique URL-safe slug
    pub slug: String,
    /// Node type, consistent with the node's depth
    pub region_type: RegionType,
    /// Materialized path; `None` for soft-deleted nodes and nodes not yet
    /// placed in the tree
    pub path: Option<RegionPath>,
    /// Underlying domain entity, if any
    pub source: Option<SourceRef>,
    /// Soft-deletion flag
    pub discarded: bool,
}

impl RegionNode {
    /// Whether this node is facility-typed
    #[must_use]
    pub fn facility_region(&self) -> bool {
        self.region_type == RegionType::Facility
    }

    /// Whether this node is block-typed
    #[must_use]
    pub fn block_region(&self) -> bool {
        self.region_type == RegionType::Block
    }

    /// Path-safe label derived from the slug: non-word bytes replaced with
    /// underscores, truncated to 255 bytes (C-locale label rules).
    #[must_use]
    pub fn path_label(&self) -> String {
        path_label_for(&self.slug)
    }
}

/// Derive a path-safe label from a slug
#[must_use]
pub fn path_label_for(slug: &str) -> String {
    let label: String = slug
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    let mut label = label;
    label.truncate(MAX_LABEL_LENGTH);
    label
}

/// Derive a URL-safe slug from a display name: lowercase, runs of
/// non-alphanumeric characters collapsed to single dashes.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}
