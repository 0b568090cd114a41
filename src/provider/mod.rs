//! Resource provider interface.
//!
//! Providers perform the remote create/read/update/delete calls for the
//! resource types they serve, validate desired properties, and declare which
//! property changes force a resource to be replaced.

mod local;
mod registry;

use async_trait::async_trait;

use crate::error::{CheckFailure, ProviderError};
use crate::planner::ObjectDiff;
use crate::resource::{PropertyKey, PropertyMap, ResourceId, TypeToken};

pub use local::LocalProvider;
pub use registry::ProviderRegistry;

/// Result type for provider calls.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Callbacks a provider exposes to the planner and executor.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Validates the desired properties of a resource.
    ///
    /// Returns the property-level failures; an empty list means valid.
    async fn check(&self, type_token: &TypeToken, properties: &PropertyMap) -> ProviderResult<Vec<CheckFailure>>;

    /// Creates a resource and returns its provider-assigned ID.
    async fn create(&self, type_token: &TypeToken, properties: &PropertyMap) -> ProviderResult<ResourceId>;

    /// Reads the current properties of a resource, outputs included.
    async fn get(&self, type_token: &TypeToken, id: &ResourceId) -> ProviderResult<PropertyMap>;

    /// Returns the property keys whose change requires replacing the resource.
    async fn inspect_change(
        &self,
        type_token: &TypeToken,
        id: &ResourceId,
        old: &PropertyMap,
        new: &PropertyMap,
        diff: &ObjectDiff,
    ) -> ProviderResult<Vec<PropertyKey>>;

    /// Updates a resource in place.
    async fn update(
        &self,
        type_token: &TypeToken,
        id: &ResourceId,
        old: &PropertyMap,
        new: &PropertyMap,
        diff: &ObjectDiff,
    ) -> ProviderResult<()>;

    /// Deletes a resource.
    async fn delete(&self, type_token: &TypeToken, id: &ResourceId) -> ProviderResult<()>;

    /// Short provider name for logs.
    fn name(&self) -> &str;
}
