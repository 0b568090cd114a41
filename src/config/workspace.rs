//! Workspace settings: where envfiles live and which environment is current.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{ConfigError, Result, StateError, StratumError};
use crate::state::{LocalCheckpointStore, WORKSPACE_DIR};

use super::validator::validate_env_name;

/// Overrides the workspace root.
pub const HOME_ENV_VAR: &str = "STRATUM_HOME";

/// Overrides the current environment.
pub const ENV_ENV_VAR: &str = "STRATUM_ENV";

/// Settings file inside the workspace directory.
const SETTINGS_FILE: &str = "workspace.yaml";

/// Persisted workspace settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceSettings {
    /// Currently selected environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<String>,
}

/// A workspace rooted at a directory.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    settings: WorkspaceSettings,
}

impl Workspace {
    /// Opens the workspace named by `STRATUM_HOME`, or the current directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the current directory is unavailable or the
    /// settings file cannot be read.
    pub fn discover() -> Result<Self> {
        let root = match std::env::var(HOME_ENV_VAR) {
            Ok(home) if !home.is_empty() => PathBuf::from(home),
            _ => std::env::current_dir()
                .map_err(|e| StratumError::internal(format!("Cannot determine current directory: {e}")))?,
        };
        Self::open(root)
    }

    /// Opens the workspace at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings file exists but cannot be parsed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let path = settings_path(&root);

        let settings = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| StateError::io(&path, &e))?;
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                message: format!("Invalid workspace settings: {e}"),
                location: Some(path.display().to_string()),
            })?
        } else {
            debug!("No workspace settings at {}", path.display());
            WorkspaceSettings::default()
        };

        Ok(Self { root, settings })
    }

    /// Workspace root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Current settings.
    #[must_use]
    pub const fn settings(&self) -> &WorkspaceSettings {
        &self.settings
    }

    /// Checkpoint store for this workspace.
    #[must_use]
    pub fn store(&self) -> LocalCheckpointStore {
        LocalCheckpointStore::new(&self.root)
    }

    /// The selected environment, honouring `STRATUM_ENV`.
    #[must_use]
    pub fn current_env(&self) -> Option<String> {
        self.current_env_with(std::env::var(ENV_ENV_VAR).ok())
    }

    fn current_env_with(&self, override_env: Option<String>) -> Option<String> {
        override_env
            .filter(|e| !e.is_empty())
            .or_else(|| self.settings.current.clone())
    }

    /// Resolves the environment to operate on: an explicit name wins over
    /// the current selection.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvironment`] if neither is set, or a
    /// validation error if the name is not a valid environment name.
    pub fn resolve_env(&self, explicit: Option<&str>) -> Result<String> {
        let name = explicit
            .map(ToString::to_string)
            .or_else(|| self.current_env())
            .ok_or(ConfigError::MissingEnvironment)?;
        validate_env_name(&name)?;
        Ok(name)
    }

    /// Selects an environment and persists the choice.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the settings file cannot
    /// be written.
    pub fn select(&mut self, name: Option<&str>) -> Result<()> {
        if let Some(name) = name {
            validate_env_name(name)?;
        }
        self.settings.current = name.map(ToString::to_string);
        self.save()?;
        match name {
            Some(name) => info!("Selected environment '{name}'"),
            None => info!("Cleared the current environment"),
        }
        Ok(())
    }

    fn save(&self) -> Result<()> {
        let path = settings_path(&self.root);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StateError::io(parent, &e))?;
        }
        let content = serde_yaml::to_string(&self.settings).map_err(|e| StateError::serialization(e.to_string()))?;
        std::fs::write(&path, content).map_err(|e| StateError::io(&path, &e))?;
        Ok(())
    }
}

fn settings_path(root: &Path) -> PathBuf {
    root.join(WORKSPACE_DIR).join(SETTINGS_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_select_persists() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let mut ws = Workspace::open(temp.path()).expect("open");
        assert!(ws.settings().current.is_none());

        ws.select(Some("prod")).expect("select");
        let reopened = Workspace::open(temp.path()).expect("reopen");
        assert_eq!(reopened.settings().current.as_deref(), Some("prod"));
    }

    #[test]
    fn test_override_wins_over_selection() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let mut ws = Workspace::open(temp.path()).expect("open");
        ws.select(Some("dev")).expect("select");

        assert_eq!(ws.current_env_with(Some(String::from("ci"))).as_deref(), Some("ci"));
        assert_eq!(ws.current_env_with(Some(String::new())).as_deref(), Some("dev"));
        assert_eq!(ws.current_env_with(None).as_deref(), Some("dev"));
    }

    #[test]
    fn test_explicit_environment_wins() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let ws = Workspace::open(temp.path()).expect("open");
        assert_eq!(ws.resolve_env(Some("qa")).expect("resolve"), "qa");
    }

    #[test]
    fn test_invalid_environment_names_are_refused() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let mut ws = Workspace::open(temp.path()).expect("open");

        assert!(ws.resolve_env(Some("../outside")).is_err());
        assert!(ws.select(Some("a/b")).is_err());
        assert!(ws.settings().current.is_none());
    }

    #[test]
    fn test_store_lives_in_workspace() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let ws = Workspace::open(temp.path()).expect("open");
        assert!(ws.store().env_dir().starts_with(temp.path()));
    }
}
