//! Parser for desired-state documents and `.env` files.
//!
//! Documents are YAML or JSON, chosen by file extension; anything that is
//! not `.json` is read as YAML.

use crate::error::{ConfigError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::DesiredState;

/// Parser for desired-state documents.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving relative paths.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_path {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Loads a desired-state document.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<DesiredState> {
        let path = self.resolve(path.as_ref());
        info!("Loading desired state from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::FileNotFound { path }.into());
        }

        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::ParseError {
            message: format!("Failed to read file: {e}"),
            location: Some(path.display().to_string()),
        })?;

        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            self.parse_json(&content, Some(&path))
        } else {
            self.parse_yaml(&content, Some(&path))
        }
    }

    /// Parses a document from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<DesiredState> {
        debug!("Parsing YAML desired state");
        let doc: DesiredState = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError {
            message: format!("YAML parse error: {e}"),
            location: source.map(|p| p.display().to_string()),
        })?;
        debug!("Parsed {} resource(s)", doc.resources.len());
        Ok(doc)
    }

    /// Parses a document from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid.
    pub fn parse_json(&self, content: &str, source: Option<&Path>) -> Result<DesiredState> {
        debug!("Parsing JSON desired state");
        let doc: DesiredState = serde_json::from_str(content).map_err(|e| ConfigError::ParseError {
            message: format!("JSON parse error: {e}"),
            location: source.map(|p| p.display().to_string()),
        })?;
        debug!("Parsed {} resource(s)", doc.resources.len());
        Ok(doc)
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self.resolve(Path::new(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| ConfigError::ParseError {
                message: format!("Failed to load .env file: {e}"),
                location: Some(env_path.display().to_string()),
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Default desired-state file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &[
    "stratum.yaml",
    "stratum.yml",
    "stratum.json",
];

/// Finds the desired-state file in a directory or its parents.
///
/// # Errors
///
/// Returns an error if no desired-state file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found desired state file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_yaml_and_json_agree() {
        let yaml = r"
resources:
  - name: data
    type: local:disk:Disk
    properties:
      size: 40
      tags: [a, b]
";
        let json = r#"{"resources": [{"name": "data", "type": "local:disk:Disk",
            "properties": {"size": 40, "tags": ["a", "b"]}}]}"#;

        let parser = ConfigParser::new();
        let from_yaml = parser.parse_yaml(yaml, None).expect("yaml");
        let from_json = parser.parse_json(json, None).expect("json");
        assert_eq!(from_yaml, from_json);
        assert_eq!(from_yaml.resources[0].name, "data");
    }

    #[test]
    fn test_load_file_relative_to_base() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(
            temp.path().join("stack.json"),
            r#"{"resources": [{"name": "a", "type": "local:disk:Disk"}]}"#,
        )
        .expect("write");

        let doc = ConfigParser::new()
            .with_base_path(temp.path())
            .load_file("stack.json")
            .expect("load");
        assert_eq!(doc.resources.len(), 1);
    }

    #[test]
    fn test_missing_file() {
        let result = ConfigParser::new().load_file("/nonexistent/stratum.yaml");
        assert!(result.is_err());
    }

    #[test]
    fn test_find_config_file_in_parent() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let nested = temp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).expect("mkdir");
        std::fs::write(temp.path().join("stratum.yaml"), "resources: []\n").expect("write");

        let found = find_config_file(&nested).expect("found");
        assert_eq!(found, temp.path().join("stratum.yaml"));
    }
}
