//! In-process provider for `local:*` resource types.
//!
//! Resources live in memory only. The provider is used for dry deployments
//! and tests, and it honours the same replacement and validation rules a
//! remote provider would declare.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{CheckFailure, ProviderError};
use crate::planner::ObjectDiff;
use crate::resource::{PropertyKey, PropertyMap, ResourceId, TypeToken};

use super::{Provider, ProviderResult};

/// Stored record for one resource.
#[derive(Debug, Clone)]
struct Record {
    type_token: TypeToken,
    properties: PropertyMap,
}

/// In-memory provider.
#[derive(Debug, Default)]
pub struct LocalProvider {
    /// Live resources by ID.
    resources: Mutex<HashMap<ResourceId, Record>>,
    /// Properties that force replacement, per type.
    immutable: HashMap<String, Vec<PropertyKey>>,
    /// Properties that must be present, per type.
    required: HashMap<String, Vec<PropertyKey>>,
}

impl LocalProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares properties of a type that can only change by replacement.
    #[must_use]
    pub fn with_immutable(mut self, type_token: &str, keys: &[&str]) -> Self {
        self.immutable
            .entry(type_token.to_string())
            .or_default()
            .extend(keys.iter().map(ToString::to_string));
        self
    }

    /// Declares properties of a type that must be set.
    #[must_use]
    pub fn with_required(mut self, type_token: &str, keys: &[&str]) -> Self {
        self.required
            .entry(type_token.to_string())
            .or_default()
            .extend(keys.iter().map(ToString::to_string));
        self
    }

    /// Number of live resources.
    pub async fn len(&self) -> usize {
        self.resources.lock().await.len()
    }

    /// Returns true if no resources are live.
    pub async fn is_empty(&self) -> bool {
        self.resources.lock().await.is_empty()
    }
}

#[async_trait]
impl Provider for LocalProvider {
    async fn check(&self, type_token: &TypeToken, properties: &PropertyMap) -> ProviderResult<Vec<CheckFailure>> {
        let failures = self
            .required
            .get(type_token.as_str())
            .map(|keys| {
                keys.iter()
                    .filter(|k| !properties.get(k).is_some_and(|v| v.has_value()))
                    .map(|k| CheckFailure {
                        property: k.clone(),
                        reason: String::from("missing required property"),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(failures)
    }

    async fn create(&self, type_token: &TypeToken, properties: &PropertyMap) -> ProviderResult<ResourceId> {
        let id = ResourceId::new(Uuid::new_v4().to_string());
        self.resources.lock().await.insert(
            id.clone(),
            Record {
                type_token: type_token.clone(),
                properties: properties.clone(),
            },
        );
        info!("Created {type_token} ({id})");
        Ok(id)
    }

    async fn get(&self, type_token: &TypeToken, id: &ResourceId) -> ProviderResult<PropertyMap> {
        let resources = self.resources.lock().await;
        match resources.get(id) {
            Some(record) if &record.type_token == type_token => Ok(record.properties.clone()),
            Some(record) => Err(ProviderError::recoverable(format!(
                "resource {id} is a {}, not a {type_token}",
                record.type_token
            ))),
            None => Err(ProviderError::recoverable(format!("resource {id} not found"))),
        }
    }

    async fn inspect_change(
        &self,
        type_token: &TypeToken,
        _id: &ResourceId,
        _old: &PropertyMap,
        _new: &PropertyMap,
        diff: &ObjectDiff,
    ) -> ProviderResult<Vec<PropertyKey>> {
        Ok(self
            .immutable
            .get(type_token.as_str())
            .map(|keys| keys.iter().filter(|k| diff.changed(k)).cloned().collect())
            .unwrap_or_default())
    }

    async fn update(
        &self,
        type_token: &TypeToken,
        id: &ResourceId,
        _old: &PropertyMap,
        new: &PropertyMap,
        _diff: &ObjectDiff,
    ) -> ProviderResult<()> {
        // Resources from an earlier process are adopted on first update.
        self.resources.lock().await.insert(
            id.clone(),
            Record {
                type_token: type_token.clone(),
                properties: new.clone(),
            },
        );
        info!("Updated {type_token} ({id})");
        Ok(())
    }

    async fn delete(&self, type_token: &TypeToken, id: &ResourceId) -> ProviderResult<()> {
        if self.resources.lock().await.remove(id).is_none() {
            debug!("{type_token} ({id}) was already deleted");
        } else {
            info!("Deleted {type_token} ({id})");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::PropertyValue;

    fn disk() -> TypeToken {
        TypeToken::new("local:disk:Disk")
    }

    fn props(size: i32) -> PropertyMap {
        let mut p = PropertyMap::new();
        p.insert("size", size.into());
        p
    }

    #[tokio::test]
    async fn test_create_get_delete() {
        let provider = LocalProvider::new();
        let id = provider.create(&disk(), &props(10)).await.expect("create");
        assert_eq!(provider.get(&disk(), &id).await.expect("get"), props(10));

        provider.delete(&disk(), &id).await.expect("delete");
        assert!(provider.is_empty().await);
        assert!(provider.get(&disk(), &id).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let provider = LocalProvider::new();
        let result = provider.delete(&disk(), &ResourceId::new("missing")).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_immutable_properties_force_replacement() {
        let provider = LocalProvider::new().with_immutable("local:disk:Disk", &["size"]);
        let old = props(10);
        let mut new = props(20);
        new.insert("label", PropertyValue::from("data"));
        let diff = old.diff(&new).expect("differs");

        let replaces = provider
            .inspect_change(&disk(), &ResourceId::new("d"), &old, &new, &diff)
            .await
            .expect("inspect");
        assert_eq!(replaces, vec![String::from("size")]);
    }

    #[tokio::test]
    async fn test_required_properties_are_checked() {
        let provider = LocalProvider::new().with_required("local:disk:Disk", &["size", "zone"]);
        let failures = provider.check(&disk(), &props(10)).await.expect("check");
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].property, "zone");
    }
}
