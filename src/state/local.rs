//! Local file-based checkpoint storage backend.
//!
//! Envfiles live under `<workspace>/.stratum/env/`, one file per
//! environment. Saves never truncate the destination in place: content is
//! written to a temporary sibling, synced, and renamed over the target after
//! the previous file has been moved to a `.bak` backup.

use async_trait::async_trait;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{Result, StateError};

use super::encoding::{Encoding, DEFAULT_EXTENSION};
use super::store::{CheckpointStore, LoadedEnvfile};
use super::types::{Envfile, StrictEnvfile};

/// Workspace directory name.
pub const WORKSPACE_DIR: &str = ".stratum";

/// Envfile directory inside the workspace directory.
const ENV_DIR: &str = "env";

/// Suffix of backup files.
const BACKUP_SUFFIX: &str = ".bak";

/// Suffix of in-flight writes.
const TEMP_SUFFIX: &str = ".tmp";

/// Local file-based checkpoint store.
#[derive(Debug, Clone)]
pub struct LocalCheckpointStore {
    /// Directory holding one envfile per environment.
    env_dir: PathBuf,
}

impl LocalCheckpointStore {
    /// Creates a store for a workspace root.
    #[must_use]
    pub fn new(workspace_root: impl AsRef<Path>) -> Self {
        Self::with_env_dir(workspace_root.as_ref().join(WORKSPACE_DIR).join(ENV_DIR))
    }

    /// Creates a store over a custom envfile directory.
    #[must_use]
    pub fn with_env_dir(env_dir: impl Into<PathBuf>) -> Self {
        Self {
            env_dir: env_dir.into(),
        }
    }

    /// Directory holding the envfiles.
    #[must_use]
    pub fn env_dir(&self) -> &Path {
        &self.env_dir
    }

    /// Default envfile path of an environment.
    #[must_use]
    pub fn env_path(&self, name: &str) -> PathBuf {
        self.env_dir.join(format!("{name}.{DEFAULT_EXTENSION}"))
    }

    /// Finds the existing envfile of an environment, whatever its encoding.
    fn find(&self, name: &str) -> Option<PathBuf> {
        Encoding::EXTENSIONS
            .iter()
            .map(|ext| self.env_dir.join(format!("{name}.{ext}")))
            .find(|p| p.exists())
    }

    /// Reads and validates an envfile at an explicit path.
    ///
    /// The content is decoded twice: once into [`Envfile`], and once
    /// generically, with resources stripped, into a strict shape that
    /// rejects unknown fields.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::NotFound`] if the file does not exist,
    /// [`StateError::Io`] for other read failures, and
    /// [`StateError::Corrupted`] if either decode fails.
    pub async fn load_path(&self, name: &str, path: &Path) -> Result<LoadedEnvfile> {
        let encoding = Encoding::detect(path)?;

        let bytes = fs::read(path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StateError::NotFound {
                    name: name.to_string(),
                    path: path.to_path_buf(),
                }
            } else {
                StateError::io(path, &e)
            }
        })?;

        let envfile: Envfile = encoding.decode(&bytes, path)?;

        let mut generic = encoding.decode_generic(&bytes, path)?;
        if let Some(latest) = generic.get_mut("latest").and_then(|l| l.as_object_mut()) {
            latest.remove("resources");
        }
        serde_json::from_value::<StrictEnvfile>(generic)
            .map_err(|e| StateError::corrupted(path, e.to_string()))?;

        debug!("Loaded envfile {} ({} resources)", path.display(), envfile.resource_count());
        Ok(LoadedEnvfile {
            path: path.to_path_buf(),
            envfile,
        })
    }

    /// Writes bytes next to `path` and syncs them to disk.
    async fn write_temp(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
        let temp_path = with_suffix(path, TEMP_SUFFIX);

        let written = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(bytes).await?;
            file.sync_all().await
        }
        .await;

        match written {
            Ok(()) => Ok(temp_path),
            Err(e) => {
                Self::discard_temp(&temp_path).await;
                Err(StateError::io(&temp_path, &e).into())
            }
        }
    }

    /// Removes a temp file left behind by a failed save.
    async fn discard_temp(temp_path: &Path) {
        if let Err(e) = fs::remove_file(temp_path).await {
            if e.kind() != ErrorKind::NotFound {
                warn!("Could not remove {}: {e}", temp_path.display());
            }
        }
    }
}

#[async_trait]
impl CheckpointStore for LocalCheckpointStore {
    async fn save(&self, envfile: &Envfile, target: Option<&Path>, exist_ok: bool) -> Result<PathBuf> {
        let requested = target.map_or_else(|| self.env_path(&envfile.name), Path::to_path_buf);
        let (path, encoding) = Encoding::resolve_target(&requested)?;

        // Nothing touches the filesystem until the content is encoded.
        let bytes = encoding.encode(envfile)?;

        let exists = path.exists();
        if exists && !exist_ok {
            return Err(StateError::AlreadyExists { path }.into());
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StateError::io(parent, &e))?;
        }

        let temp_path = Self::write_temp(&path, &bytes).await?;

        if exists {
            let backup = with_suffix(&path, BACKUP_SUFFIX);
            if let Err(e) = fs::rename(&path, &backup).await {
                warn!("Could not back up {} to {}: {e}", path.display(), backup.display());
            }
        }

        if let Err(e) = fs::rename(&temp_path, &path).await {
            Self::discard_temp(&temp_path).await;
            return Err(StateError::io(&path, &e).into());
        }

        info!("Saved envfile for '{}' to {}", envfile.name, path.display());
        Ok(path)
    }

    async fn load(&self, name: &str) -> Result<LoadedEnvfile> {
        let path = self.find(name).unwrap_or_else(|| self.env_path(name));
        self.load_path(name, &path).await
    }

    async fn remove(&self, name: &str) -> Result<PathBuf> {
        let Some(path) = self.find(name) else {
            return Err(StateError::NotFound {
                name: name.to_string(),
                path: self.env_path(name),
            }
            .into());
        };

        let backup = with_suffix(&path, BACKUP_SUFFIX);
        fs::rename(&path, &backup)
            .await
            .map_err(|e| StateError::io(&path, &e))?;

        info!("Removed environment '{name}' (backup at {})", backup.display());
        Ok(backup)
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut entries = match fs::read_dir(&self.env_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No envfile directory at {}", self.env_dir.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(StateError::io(&self.env_dir, &e).into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StateError::io(&self.env_dir, &e))?
        {
            let path = entry.path();
            let recognised = path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(Encoding::from_extension)
                .is_some();
            if let (true, Some(stem)) = (recognised, path.file_stem().and_then(|s| s.to_str())) {
                names.push(stem.to_string());
            }
        }
        names.sort_unstable();
        names.dedup();
        Ok(names)
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.find(name).is_some())
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}

/// Appends a suffix to the full file name (`dev.json` -> `dev.json.bak`).
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StratumError;
    use crate::resource::{PropertyMap, PropertyValue, ResourceId, ResourceState, Snapshot, TypeToken, Urn};
    use tempfile::TempDir;

    fn create_test_store() -> (LocalCheckpointStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = LocalCheckpointStore::new(temp_dir.path());
        (store, temp_dir)
    }

    fn deployed_env() -> Envfile {
        let mut props = PropertyMap::new();
        props.insert("size", PropertyValue::from(40));
        props.insert("zone", PropertyValue::from("eu-west-1a"));
        props.insert("tags", PropertyValue::from(vec!["a", "b"]));
        let res = ResourceState::new(
            Urn::new("dev", "local:disk:Disk", "data"),
            TypeToken::new("local:disk:Disk"),
            props,
        )
        .with_id(ResourceId::new("disk-1"));

        let mut env = Envfile::new("dev");
        env.config.insert(String::from("region"), String::from("eu-west-1"));
        env.record(Snapshot::new("dev", vec![res]));
        env
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let (store, _temp) = create_test_store();
        let env = deployed_env();

        let path = store.save(&env, None, true).await.expect("Failed to save");
        assert_eq!(path, store.env_path("dev"));

        let loaded = store.load("dev").await.expect("Failed to load");
        assert_eq!(loaded.envfile, env);
        assert_eq!(loaded.envfile.snapshot(), env.snapshot());
    }

    #[tokio::test]
    async fn test_yaml_round_trip() {
        let (store, temp) = create_test_store();
        let env = deployed_env();
        let target = temp.path().join("out").join("dev.yaml");

        let path = store.save(&env, Some(&target), true).await.expect("Failed to save");
        let loaded = store.load_path("dev", &path).await.expect("Failed to load");
        assert_eq!(loaded.envfile, env);
    }

    #[tokio::test]
    async fn test_exist_ok_false_leaves_existing_file_alone() {
        let (store, _temp) = create_test_store();
        let path = store.save(&Envfile::new("dev"), None, false).await.expect("first save");
        let before = std::fs::read(&path).expect("read");

        let result = store.save(&deployed_env(), None, false).await;
        assert!(matches!(
            result,
            Err(StratumError::State(StateError::AlreadyExists { .. }))
        ));
        assert_eq!(std::fs::read(&path).expect("read"), before);
        assert!(!with_suffix(&path, BACKUP_SUFFIX).exists());
    }

    #[tokio::test]
    async fn test_exist_ok_false_leaves_existing_backup_alone() {
        let (store, _temp) = create_test_store();
        let path = store.save(&Envfile::new("dev"), None, false).await.expect("first save");
        let backup = with_suffix(&path, BACKUP_SUFFIX);
        std::fs::write(&backup, b"older generation").expect("write backup");

        let result = store.save(&deployed_env(), None, false).await;
        assert!(result.is_err());
        assert_eq!(std::fs::read(&backup).expect("read backup"), b"older generation");
    }

    #[tokio::test]
    async fn test_failed_rename_removes_temp_file() {
        let (store, _temp) = create_test_store();
        let path = store.env_path("dev");
        let backup = with_suffix(&path, BACKUP_SUFFIX);
        // Non-empty directories at both names make the backup and the final
        // rename fail.
        std::fs::create_dir_all(path.join("keep")).expect("create dir");
        std::fs::create_dir_all(backup.join("keep")).expect("create backup dir");

        let result = store.save(&deployed_env(), None, true).await;
        assert!(matches!(result, Err(StratumError::State(StateError::Io { .. }))));
        assert!(!with_suffix(&path, TEMP_SUFFIX).exists());
        assert!(path.join("keep").exists());
    }

    #[tokio::test]
    async fn test_overwrite_keeps_backup() {
        let (store, _temp) = create_test_store();
        let path = store.save(&Envfile::new("dev"), None, true).await.expect("first save");
        let first = std::fs::read(&path).expect("read");

        store.save(&deployed_env(), None, true).await.expect("second save");

        assert_eq!(std::fs::read(with_suffix(&path, BACKUP_SUFFIX)).expect("backup"), first);
        assert!(!with_suffix(&path, TEMP_SUFFIX).exists());
        let loaded = store.load("dev").await.expect("load");
        assert_eq!(loaded.envfile.resource_count(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_target_writes_nothing() {
        let (store, temp) = create_test_store();
        let target = temp.path().join("dev.toml");

        let result = store.save(&Envfile::new("dev"), Some(&target), true).await;
        assert!(matches!(
            result,
            Err(StratumError::State(StateError::UnsupportedFormat { .. }))
        ));
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_target_without_extension_gets_json() {
        let (store, temp) = create_test_store();
        let path = store
            .save(&Envfile::new("dev"), Some(&temp.path().join("snapshot")), true)
            .await
            .expect("save");
        assert_eq!(path, temp.path().join("snapshot.json"));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_load_missing_is_not_found() {
        let (store, _temp) = create_test_store();
        let result = store.load("prod").await;
        assert!(matches!(
            result,
            Err(StratumError::State(StateError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_unknown_fields_are_rejected() {
        let (store, _temp) = create_test_store();
        std::fs::create_dir_all(store.env_dir()).expect("mkdir");
        std::fs::write(
            store.env_path("dev"),
            r#"{"name": "dev", "latset": {"time": "2024-01-01T00:00:00Z"}}"#,
        )
        .expect("write");

        let result = store.load("dev").await;
        assert!(matches!(
            result,
            Err(StratumError::State(StateError::Corrupted { .. }))
        ));
    }

    #[tokio::test]
    async fn test_garbage_is_corrupted() {
        let (store, _temp) = create_test_store();
        std::fs::create_dir_all(store.env_dir()).expect("mkdir");
        std::fs::write(store.env_path("dev"), "{not json").expect("write");

        let err = store.load("dev").await.expect_err("must fail");
        assert!(err.to_string().contains("dev.json"));
    }

    #[tokio::test]
    async fn test_remove_keeps_backup_and_list() {
        let (store, _temp) = create_test_store();
        store.save(&Envfile::new("dev"), None, false).await.expect("save dev");
        store.save(&Envfile::new("prod"), None, false).await.expect("save prod");
        assert_eq!(store.list().await.expect("list"), vec!["dev", "prod"]);

        let backup = store.remove("dev").await.expect("remove");
        assert!(backup.exists());
        assert!(!store.exists("dev").await.expect("exists"));
        assert_eq!(store.list().await.expect("list"), vec!["prod"]);
    }
}
