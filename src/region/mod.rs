//! Materialized-path region tree
//!
//! Stores the organizational hierarchy as a flat node table whose `path`
//! column encodes each node's full ancestor chain. Ancestor and descendant
//! queries are label-prefix containment checks; traversal-direction
//! validity is decided against the canonical type order rather than via
//! per-type methods.

use log::info;
use rand::Rng;
use rand::distr::Alphanumeric;
use rustc_hash::FxHashMap;

use crate::error::{ReportError, Result};
use crate::models::{
    Patient, RegionNode, RegionPath, RegionType, SourceRef, path_label_for, slugify,
};
use crate::store::PatientStore;

/// The region hierarchy: a node table with slug and path indexes
#[derive(Debug, Default)]
pub struct RegionTree {
    nodes: FxHashMap<String, RegionNode>,
    slug_index: FxHashMap<String, String>,
    next_id: u64,
}

impl RegionTree {
    /// Create an empty tree
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a node by id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&RegionNode> {
        self.nodes.get(id)
    }

    /// Look up a node by slug
    #[must_use]
    pub fn get_by_slug(&self, slug: &str) -> Option<&RegionNode> {
        self.slug_index.get(slug).and_then(|id| self.nodes.get(id))
    }

    /// Resolve a region reference given as either a slug or an id
    pub fn resolve(&self, reference: &str) -> Result<&RegionNode> {
        self.get_by_slug(reference)
            .or_else(|| self.get(reference))
            .ok_or_else(|| ReportError::RegionNotFound(reference.to_string()))
    }

    /// The unique root node, if the tree is seeded
    #[must_use]
    pub fn root(&self) -> Option<&RegionNode> {
        self.nodes
            .values()
            .find(|n| n.region_type == RegionType::Root && !n.discarded)
    }

    /// All nodes, discarded included
    pub fn nodes(&self) -> impl Iterator<Item = &RegionNode> {
        self.nodes.values()
    }

    /// Ordered sequence of slug candidates for a new node: the name alone,
    /// then name plus type, then name plus type plus a short random suffix.
    /// Tried in order until one is free, so collisions resolve
    /// deterministically without global locking.
    #[must_use]
    pub fn slug_candidates(&self, name: &str, region_type: RegionType) -> Vec<String> {
        let base = slugify(name);
        let suffix: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(|c| (c as char).to_ascii_lowercase())
            .collect();
        vec![
            base.clone(),
            format!("{base}-{}", region_type.name()),
            format!("{base}-{}-{suffix}", region_type.name()),
        ]
    }

    fn free_slug(&self, name: &str, region_type: RegionType) -> Result<String> {
        self.slug_candidates(name, region_type)
            .into_iter()
            .find(|candidate| !self.slug_index.contains_key(candidate))
            .ok_or_else(|| {
                ReportError::Validation(format!("no free slug candidate for '{name}'"))
            })
    }

    /// Create a node under `parent` (required for every type but root).
    /// Returns the new node's id.
    pub fn create_region(
        &mut self,
        name: &str,
        region_type: RegionType,
        parent: Option<&str>,
        source: Option<SourceRef>,
    ) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ReportError::Validation("name can't be blank".to_string()));
        }

        let parent_path = match (region_type, parent) {
            (RegionType::Root, None) => {
                if self.root().is_some() {
                    return Err(ReportError::Validation("root region already exists".to_string()));
                }
                None
            }
            (RegionType::Root, Some(_)) => {
                return Err(ReportError::Validation("root region can't have a parent".to_string()));
            }
            (_, None) => {
                return Err(ReportError::Validation(format!(
                    "{} region requires a parent",
                    region_type.name()
                )));
            }
            (_, Some(parent_id)) => {
                let parent = self
                    .nodes
                    .get(parent_id)
                    .ok_or_else(|| ReportError::RegionNotFound(parent_id.to_string()))?;
                if parent.discarded {
                    return Err(ReportError::Validation(format!(
                        "parent region '{}' is discarded",
                        parent.slug
                    )));
                }
                if parent.region_type.rank() >= region_type.rank() {
                    return Err(ReportError::Validation(format!(
                        "a {} region can't sit under a {} region",
                        region_type.name(),
                        parent.region_type.name()
                    )));
                }
                Some(parent.path.clone().ok_or_else(|| {
                    ReportError::Validation(format!("parent region '{}' has no path", parent.slug))
                })?)
            }
        };

        let slug = self.free_slug(name, region_type)?;
        let label = path_label_for(&slug);
        let path = match parent_path {
            Some(parent_path) => parent_path.child(&label),
            None => RegionPath::root(&label),
        };
        self.validate_unique_path(&path, None)?;

        let id = format!("region-{}", self.next_id);
        self.next_id += 1;

        info!("creating {} region '{name}' at path {path}", region_type.name());
        self.slug_index.insert(slug.clone(), id.clone());
        self.nodes.insert(
            id.clone(),
            RegionNode {
                id: id.clone(),
                name: name.to_string(),
                slug,
                region_type,
                path: Some(path),
                source,
                discarded: false,
            },
        );
        Ok(id)
    }

    fn validate_unique_path(&self, path: &RegionPath, except: Option<&str>) -> Result<()> {
        let taken = self
            .nodes
            .values()
            .filter(|n| Some(n.id.as_str()) != except)
            .any(|n| n.path.as_ref() == Some(path));
        if taken {
            return Err(ReportError::Validation(format!("path '{path}' is already taken")));
        }
        Ok(())
    }

    /// Move a node under a new parent. Recomputes only this node's path;
    /// descendants keep their stored paths until the caller re-saves them.
    pub fn reparent(&mut self, id: &str, new_parent_id: &str) -> Result<()> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| ReportError::RegionNotFound(id.to_string()))?;
        let parent = self
            .nodes
            .get(new_parent_id)
            .ok_or_else(|| ReportError::RegionNotFound(new_parent_id.to_string()))?;

        if parent.discarded {
            return Err(ReportError::Validation(format!(
                "can't reparent '{}' under discarded region '{}'",
                node.slug, parent.slug
            )));
        }
        let parent_path = parent.path.clone().ok_or_else(|| {
            ReportError::Validation(format!("region '{}' has no path", parent.slug))
        })?;
        if let Some(node_path) = &node.path {
            if node_path.is_self_or_ancestor_of(&parent_path) {
                return Err(ReportError::Validation(format!(
                    "reparenting '{}' under '{}' would create a cycle",
                    node.slug, parent.slug
                )));
            }
        }
        if parent.region_type.rank() >= node.region_type.rank() {
            return Err(ReportError::Validation(format!(
                "a {} region can't sit under a {} region",
                node.region_type.name(),
                parent.region_type.name()
            )));
        }

        let new_path = parent_path.child(&node.path_label());
        self.validate_unique_path(&new_path, Some(id))?;

        info!("reparenting region '{}' to path {new_path}", node.slug);
        if let Some(node) = self.nodes.get_mut(id) {
            node.path = Some(new_path);
        }
        Ok(())
    }

    /// Soft-delete a node: clears its path, removing it from path-based
    /// traversal without renumbering siblings.
    pub fn discard(&mut self, id: &str) -> Result<()> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| ReportError::RegionNotFound(id.to_string()))?;
        node.discarded = true;
        node.path = None;
        Ok(())
    }

    /// The node's ancestor chain including itself, shallowest first
    pub fn self_and_ancestors(&self, id: &str) -> Result<Vec<&RegionNode>> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| ReportError::RegionNotFound(id.to_string()))?;
        let path = node
            .path
            .as_ref()
            .ok_or_else(|| ReportError::Validation(format!("region '{}' has no path", node.slug)))?;
        let mut chain: Vec<&RegionNode> = self
            .nodes
            .values()
            .filter(|n| n.path.as_ref().is_some_and(|p| p.is_self_or_ancestor_of(path)))
            .collect();
        chain.sort_by_key(|n| n.path.as_ref().map_or(0, RegionPath::len));
        Ok(chain)
    }

    /// The unique ancestor (or self) of the requested type.
    ///
    /// Fails with `NotSupported` when the requested type is strictly
    /// deeper than the node's own type: asking a district for its facility
    /// ancestor is a caller bug. Returns `Ok(None)` when the direction is
    /// valid but no such ancestor exists.
    pub fn ancestor_of_type(
        &self,
        id: &str,
        region_type: RegionType,
    ) -> Result<Option<&RegionNode>> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| ReportError::RegionNotFound(id.to_string()))?;
        if region_type.rank() > node.region_type.rank() {
            return Err(ReportError::NotSupported(format!(
                "no {} ancestor for region '{}' of type {}",
                region_type.name(),
                node.name,
                node.region_type.name()
            )));
        }
        Ok(self
            .self_and_ancestors(id)?
            .into_iter()
            .find(|n| n.region_type == region_type))
    }

    /// All descendants (or self) of the requested type, ordered by slug.
    ///
    /// Fails with `NotSupported` when the requested type precedes the
    /// node's own type in the canonical order.
    pub fn descendants_of_type(
        &self,
        id: &str,
        region_type: RegionType,
    ) -> Result<Vec<&RegionNode>> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| ReportError::RegionNotFound(id.to_string()))?;
        if region_type.rank() < node.region_type.rank() {
            return Err(ReportError::NotSupported(format!(
                "no {} descendants for region '{}' of type {}",
                region_type.name(),
                node.name,
                node.region_type.name()
            )));
        }
        let path = node
            .path
            .as_ref()
            .ok_or_else(|| ReportError::Validation(format!("region '{}' has no path", node.slug)))?;
        let mut descendants: Vec<&RegionNode> = self
            .nodes
            .values()
            .filter(|n| n.region_type == region_type)
            .filter(|n| n.path.as_ref().is_some_and(|p| path.is_self_or_ancestor_of(p)))
            .collect();
        descendants.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(descendants)
    }

    /// Facility ids under a node: the node's own source facility for
    /// facility-typed nodes, otherwise the sources of all facility-typed
    /// descendants.
    pub fn facilities_of(&self, id: &str) -> Result<Vec<String>> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| ReportError::RegionNotFound(id.to_string()))?;
        if node.facility_region() {
            return Ok(node
                .source
                .as_ref()
                .and_then(|s| s.facility_id())
                .map(str::to_string)
                .into_iter()
                .collect());
        }
        Ok(self
            .descendants_of_type(id, RegionType::Facility)?
            .iter()
            .filter_map(|n| n.source.as_ref().and_then(SourceRef::facility_id))
            .map(str::to_string)
            .collect())
    }

    /// Non-deleted patients registered at the node's facilities
    pub fn registered_patients<'s>(
        &self,
        id: &str,
        store: &'s PatientStore,
    ) -> Result<Vec<&'s Patient>> {
        let facilities = self.facilities_of(id)?;
        Ok(collect_patients(store, |p| {
            !p.deleted && facilities.contains(&p.registration_facility)
        }))
    }

    /// Non-deleted patients currently assigned to the node's facilities
    pub fn assigned_patients<'s>(
        &self,
        id: &str,
        store: &'s PatientStore,
    ) -> Result<Vec<&'s Patient>> {
        let facilities = self.facilities_of(id)?;
        Ok(collect_patients(store, |p| {
            !p.deleted && facilities.contains(&p.assigned_facility)
        }))
    }

    /// Non-deleted patients with an appointment at the node's facilities
    pub fn appointed_patients<'s>(
        &self,
        id: &str,
        store: &'s PatientStore,
    ) -> Result<Vec<&'s Patient>> {
        let facilities = self.facilities_of(id)?;
        let appointed = store.appointed_patient_ids(&facilities);
        Ok(collect_patients(store, |p| {
            !p.deleted && appointed.binary_search(&p.id).is_ok()
        }))
    }

    /// Patients a node syncs: block regions get the union of registered,
    /// assigned and appointed patients including soft-deleted ones (block
    /// sync needs broader visibility than reporting); every other type
    /// gets only registered patients.
    pub fn syncable_patients<'s>(
        &self,
        id: &str,
        store: &'s PatientStore,
    ) -> Result<Vec<&'s Patient>> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| ReportError::RegionNotFound(id.to_string()))?;
        if !node.block_region() {
            return self.registered_patients(id, store);
        }
        let facilities = self.facilities_of(id)?;
        let appointed = store.appointed_patient_ids(&facilities);
        Ok(collect_patients(store, |p| {
            facilities.contains(&p.registration_facility)
                || facilities.contains(&p.assigned_facility)
                || appointed.binary_search(&p.id).is_ok()
        }))
    }
}

fn collect_patients<'s>(
    store: &'s PatientStore,
    predicate: impl Fn(&Patient) -> bool,
) -> Vec<&'s Patient> {
    let mut patients: Vec<&Patient> = store.patients().filter(|p| predicate(p)).collect();
    patients.sort_by(|a, b| a.id.cmp(&b.id));
    patients
}
