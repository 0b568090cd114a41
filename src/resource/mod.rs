//! Resource model for the deployment engine.
//!
//! This module defines the property value tree that describes resource
//! state, resource identities, and the snapshots that group resources
//! into an environment.

mod property;
mod snapshot;
mod urn;

pub use property::{PropertyKey, PropertyMap, PropertyValue, ResourceRef, UnknownValue, REF_KEY, UNKNOWN_KEY};
pub use snapshot::{ResourceState, Snapshot};
pub use urn::{ResourceId, TypeToken, Urn};
