//! Resource states and environment snapshots.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{PlanError, Result};

use super::property::PropertyMap;
use super::urn::{ResourceId, TypeToken, Urn};

/// The recorded or desired state of a single resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Logical identity.
    pub urn: Urn,
    /// Provider-assigned identifier, once the resource exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ResourceId>,
    /// Type token selecting the provider.
    #[serde(rename = "type")]
    pub type_token: TypeToken,
    /// Input and output properties.
    #[serde(default)]
    pub properties: PropertyMap,
}

/// The full state of all resources in an environment, in dependency order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Environment the resources belong to.
    pub environment: String,
    /// Resources, dependencies before dependents.
    pub resources: Vec<ResourceState>,
}

impl ResourceState {
    /// Creates a resource state that has not been assigned an ID yet.
    #[must_use]
    pub const fn new(urn: Urn, type_token: TypeToken, properties: PropertyMap) -> Self {
        Self {
            urn,
            id: None,
            type_token,
            properties,
        }
    }

    /// Sets the provider-assigned ID.
    #[must_use]
    pub fn with_id(mut self, id: ResourceId) -> Self {
        self.id = Some(id);
        self
    }
}

impl Snapshot {
    /// Creates an empty snapshot for an environment.
    #[must_use]
    pub fn empty(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            resources: Vec::new(),
        }
    }

    /// Creates a snapshot from resources in dependency order.
    #[must_use]
    pub fn new(environment: impl Into<String>, resources: Vec<ResourceState>) -> Self {
        Self {
            environment: environment.into(),
            resources,
        }
    }

    /// Finds a resource by URN.
    #[must_use]
    pub fn get(&self, urn: &Urn) -> Option<&ResourceState> {
        self.resources.iter().find(|r| &r.urn == urn)
    }

    /// Number of resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns true if the snapshot holds no resources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Checks that every URN appears once.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::DuplicateUrn`] for the first repeated URN.
    pub fn ensure_unique(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for res in &self.resources {
            if !seen.insert(&res.urn) {
                return Err(PlanError::DuplicateUrn {
                    urn: res.urn.clone(),
                }
                .into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn res(name: &str) -> ResourceState {
        ResourceState::new(
            Urn::new("dev", "local:disk:Disk", name),
            TypeToken::new("local:disk:Disk"),
            PropertyMap::new(),
        )
    }

    #[test]
    fn test_lookup_by_urn() {
        let snap = Snapshot::new("dev", vec![res("a"), res("b")]);
        assert_eq!(snap.len(), 2);
        assert!(snap.get(&Urn::new("dev", "local:disk:Disk", "b")).is_some());
        assert!(snap.get(&Urn::new("dev", "local:disk:Disk", "c")).is_none());
    }

    #[test]
    fn test_duplicate_urns_are_rejected() {
        let snap = Snapshot::new("dev", vec![res("a"), res("a")]);
        assert!(snap.ensure_unique().is_err());
        assert!(Snapshot::new("dev", vec![res("a")]).ensure_unique().is_ok());
    }

    #[test]
    fn test_resource_state_serializes_type_field() {
        let json = serde_json::to_value(res("a").with_id(ResourceId::new("d-1"))).expect("json");
        assert_eq!(json["type"], "local:disk:Disk");
        assert_eq!(json["id"], "d-1");
    }
}
