//! Envfile types for tracking deployment state.
//!
//! An envfile is the durable record of one environment: its configuration
//! variables and the snapshot produced by its latest deployment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::resource::{ResourceState, Snapshot};

/// Durable record of an environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envfile {
    /// Environment name.
    pub name: String,
    /// Configuration variables.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, String>,
    /// Latest deployment, absent until the first apply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<Deployment>,
}

/// A completed (possibly partial) deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    /// When the deployment finished.
    pub time: DateTime<Utc>,
    /// Resources in dependency order.
    #[serde(default)]
    pub resources: Vec<ResourceState>,
}

/// Strict view of an envfile used to reject unknown fields.
///
/// Resource entries are removed from the generic document before it is
/// decoded into this shape, since they hold arbitrary property trees.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(dead_code)]
pub(crate) struct StrictEnvfile {
    pub name: String,
    #[serde(default)]
    pub config: BTreeMap<String, String>,
    #[serde(default)]
    pub latest: Option<StrictDeployment>,
}

/// Strict view of [`Deployment`] without its resources.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(dead_code)]
pub(crate) struct StrictDeployment {
    pub time: DateTime<Utc>,
}

impl Envfile {
    /// Creates an envfile with no configuration and no deployment.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: BTreeMap::new(),
            latest: None,
        }
    }

    /// Records a snapshot as the latest deployment, stamped now.
    pub fn record(&mut self, snapshot: Snapshot) {
        self.latest = Some(Deployment {
            time: Utc::now(),
            resources: snapshot.resources,
        });
    }

    /// The latest snapshot, if the environment was ever deployed.
    #[must_use]
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.latest
            .as_ref()
            .map(|d| Snapshot::new(self.name.clone(), d.resources.clone()))
    }

    /// Number of resources in the latest deployment.
    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.latest.as_ref().map_or(0, |d| d.resources.len())
    }

    /// Time of the latest deployment.
    #[must_use]
    pub fn deployed_at(&self) -> Option<DateTime<Utc>> {
        self.latest.as_ref().map(|d| d.time)
    }
}
