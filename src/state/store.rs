//! Checkpoint store trait definition.
//!
//! This module defines the common interface for envfile storage backends.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::types::Envfile;
use crate::error::Result;

/// An envfile together with the file it was read from.
#[derive(Debug, Clone)]
pub struct LoadedEnvfile {
    /// File the envfile was read from.
    pub path: PathBuf,
    /// Decoded content.
    pub envfile: Envfile,
}

/// Trait for checkpoint storage backends.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Saves an envfile.
    ///
    /// `target` overrides the environment's default location. With
    /// `exist_ok` false, an existing file is an error and is left untouched;
    /// otherwise it is backed up before being replaced. Returns the path
    /// written.
    async fn save(&self, envfile: &Envfile, target: Option<&Path>, exist_ok: bool) -> Result<PathBuf>;

    /// Loads the envfile of an environment.
    async fn load(&self, name: &str) -> Result<LoadedEnvfile>;

    /// Removes an environment, keeping a backup of its envfile.
    async fn remove(&self, name: &str) -> Result<PathBuf>;

    /// Names of all stored environments, sorted.
    async fn list(&self) -> Result<Vec<String>>;

    /// Checks if an environment has an envfile.
    async fn exists(&self, name: &str) -> Result<bool>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}
