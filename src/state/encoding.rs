//! Envfile encodings, selected by file extension.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

use crate::error::{Result, StateError};

/// Extension appended to targets that have none.
pub const DEFAULT_EXTENSION: &str = "json";

/// Serialization format of an envfile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Pretty-printed JSON.
    Json,
    /// YAML.
    Yaml,
}

impl Encoding {
    /// Extensions that have an encoding.
    pub const EXTENSIONS: [&'static str; 3] = ["json", "yaml", "yml"];

    /// Encoding for an extension (without the dot).
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    /// Detects the encoding of an existing path.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::UnsupportedFormat`] if the extension is missing
    /// or unknown.
    pub fn detect(path: &Path) -> Result<Self> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        Self::from_extension(ext).ok_or_else(|| {
            StateError::UnsupportedFormat {
                extension: ext.to_string(),
            }
            .into()
        })
    }

    /// Resolves a save target: a path without an extension gets `.json`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::UnsupportedFormat`] for an unknown extension.
    pub fn resolve_target(path: &Path) -> Result<(PathBuf, Self)> {
        if path.extension().is_none() {
            let mut with_ext = path.as_os_str().to_owned();
            with_ext.push(".");
            with_ext.push(DEFAULT_EXTENSION);
            return Ok((PathBuf::from(with_ext), Self::Json));
        }
        let encoding = Self::detect(path)?;
        Ok((path.to_path_buf(), encoding))
    }

    /// Encodes a value.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the value cannot be encoded.
    pub fn encode<T: Serialize>(self, value: &T) -> Result<Vec<u8>> {
        let bytes = match self {
            Self::Json => serde_json::to_vec_pretty(value).map_err(|e| StateError::serialization(e.to_string()))?,
            Self::Yaml => serde_yaml::to_string(value)
                .map_err(|e| StateError::serialization(e.to_string()))?
                .into_bytes(),
        };
        Ok(bytes)
    }

    /// Decodes a value; failures are reported as corruption of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Corrupted`] if the bytes do not decode.
    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8], path: &Path) -> Result<T> {
        let decoded = match self {
            Self::Json => serde_json::from_slice(bytes).map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml::from_slice(bytes).map_err(|e| e.to_string()),
        };
        decoded.map_err(|message| StateError::corrupted(path, message).into())
    }

    /// Decodes into a generic JSON value, whatever the encoding.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Corrupted`] if the bytes do not decode.
    pub fn decode_generic(self, bytes: &[u8], path: &Path) -> Result<serde_json::Value> {
        match self {
            Self::Json => self.decode(bytes, path),
            Self::Yaml => {
                let yaml: serde_yaml::Value = self.decode(bytes, path)?;
                serde_json::to_value(yaml).map_err(|e| StateError::corrupted(path, e.to_string()).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_by_extension() {
        assert_eq!(Encoding::detect(Path::new("a/dev.json")).ok(), Some(Encoding::Json));
        assert_eq!(Encoding::detect(Path::new("dev.yml")).ok(), Some(Encoding::Yaml));
        assert!(Encoding::detect(Path::new("dev.toml")).is_err());
        assert!(Encoding::detect(Path::new("dev")).is_err());
    }

    #[test]
    fn test_resolve_target_appends_default_extension() {
        let (path, encoding) = Encoding::resolve_target(Path::new("out/dev")).expect("resolve");
        assert_eq!(path, PathBuf::from("out/dev.json"));
        assert_eq!(encoding, Encoding::Json);
        assert!(Encoding::resolve_target(Path::new("dev.txt")).is_err());
    }

    #[test]
    fn test_yaml_generic_matches_json() {
        let path = Path::new("dev.yaml");
        let value = Encoding::Yaml
            .decode_generic(b"name: dev\nconfig:\n  region: eu\n", path)
            .expect("decode");
        assert_eq!(value["config"]["region"], "eu");
    }
}
