//! Checkpoint persistence for the Stratum deployment engine.
//!
//! This module stores one envfile per environment: configuration variables
//! plus the snapshot of the latest deployment, encoded as JSON or YAML.

mod encoding;
mod local;
mod store;
mod types;

pub use encoding::{Encoding, DEFAULT_EXTENSION};
pub use local::{LocalCheckpointStore, WORKSPACE_DIR};
pub use store::{CheckpointStore, LoadedEnvfile};
pub use types::{Deployment, Envfile};
