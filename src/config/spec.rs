//! Desired-state document types.
//!
//! A desired-state document lists resources in dependency order. Resources
//! refer to each other by short name (`{"$ref": "<name>"}`); references are
//! resolved to full URNs when the document is turned into a [`Snapshot`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::resource::{PropertyMap, ResourceRef, ResourceState, Snapshot, TypeToken, Urn};

/// The root of a desired-state document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DesiredState {
    /// Resources, dependencies before dependents.
    #[serde(default)]
    pub resources: Vec<ResourceSpec>,
}

/// One desired resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceSpec {
    /// Short name, unique within the document.
    pub name: String,
    /// Type token, `package:module:Type`.
    #[serde(rename = "type")]
    pub type_token: String,
    /// Input properties.
    #[serde(default)]
    pub properties: PropertyMap,
}

impl DesiredState {
    /// Looks up a resource by short name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ResourceSpec> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Converts the document into a snapshot for an environment.
    ///
    /// Short-name references to earlier resources become full URNs;
    /// references that are already URNs are kept as written.
    #[must_use]
    pub fn to_snapshot(&self, environment: &str) -> Snapshot {
        let mut urns: HashMap<&str, Urn> = HashMap::new();
        let mut resources = Vec::with_capacity(self.resources.len());

        for spec in &self.resources {
            let urn = Urn::new(environment, &spec.type_token, &spec.name);
            let mut properties = spec.properties.clone();
            properties.map_refs(&mut |r: &ResourceRef| {
                if r.urn().is_qualified() {
                    return r.clone();
                }
                urns.get(r.urn().as_str())
                    .map_or_else(|| r.clone(), |full| ResourceRef::new(full.clone()))
            });

            resources.push(ResourceState::new(
                urn.clone(),
                TypeToken::new(spec.type_token.clone()),
                properties,
            ));
            urns.insert(spec.name.as_str(), urn);
        }

        Snapshot::new(environment, resources)
    }
}
