//! Error types for the Stratum deployment engine.
//!
//! This module provides the error hierarchy for every stage of a deployment:
//! reading desired state, building a plan, calling providers, applying steps,
//! and persisting checkpoints.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::planner::StepOp;
use crate::resource::Urn;

/// The main error type for the Stratum deployment engine.
#[derive(Debug, Error)]
pub enum StratumError {
    /// Configuration and desired-state errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Checkpoint persistence errors.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Resource provider errors.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Planning errors.
    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    /// Plan application errors.
    #[error("Apply error: {0}")]
    Apply(#[from] ApplyError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration and desired-state errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The desired-state file was not found.
    #[error("Desired state file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// A file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// No environment was named and none is selected in the workspace.
    #[error("Missing environment name (and no current environment is selected)")]
    MissingEnvironment,
}

/// Checkpoint persistence errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// No envfile exists for the environment.
    #[error("Environment '{name}' does not exist (no envfile at {path})")]
    NotFound {
        /// Environment name.
        name: String,
        /// Path that was looked up.
        path: PathBuf,
    },

    /// The file extension does not map to a known encoding.
    #[error("Unsupported envfile format '{extension}' (expected .json, .yaml or .yml)")]
    UnsupportedFormat {
        /// The offending extension.
        extension: String,
    },

    /// The target file exists and overwriting was not allowed.
    #[error("File '{path}' already exists")]
    AlreadyExists {
        /// Path of the existing file.
        path: PathBuf,
    },

    /// The envfile could not be decoded or failed validation.
    #[error("Could not read deployment from {path}: {message}")]
    Corrupted {
        /// Path of the corrupted file.
        path: PathBuf,
        /// Description of the decode failure.
        message: String,
    },

    /// The envfile could not be encoded.
    #[error("State serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },

    /// A filesystem operation failed.
    #[error("IO error on {path}: {message}")]
    Io {
        /// Path involved in the failed operation.
        path: PathBuf,
        /// Description of the IO error.
        message: String,
    },
}

/// What a provider knows about a resource after a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    /// The call failed but the resource is in a known, recoverable state.
    Ok,
    /// The call failed and the remote state of the resource is unknowable.
    Unknown,
}

/// An error reported by a resource provider.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ProviderError {
    /// Description of the failure.
    pub message: String,
    /// State the resource was left in.
    pub status: ResourceStatus,
}

/// A single property-level failure reported by a provider's `check`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckFailure {
    /// Property that failed.
    pub property: String,
    /// Why it failed.
    pub reason: String,
}

/// Planning errors.
#[derive(Debug, Error)]
pub enum PlanError {
    /// No provider is registered for a resource type.
    #[error("No provider registered for resource type '{type_token}'")]
    MissingProvider {
        /// The unserved type token.
        type_token: String,
    },

    /// The same URN appears twice in a snapshot.
    #[error("Duplicate resource URN in snapshot: {urn}")]
    DuplicateUrn {
        /// The duplicated URN.
        urn: Urn,
    },

    /// A provider rejected the desired properties of a resource.
    #[error("Resource {urn} failed provider checks: {}", format_failures(.failures))]
    CheckFailed {
        /// Resource that failed.
        urn: Urn,
        /// Every property-level failure.
        failures: Vec<CheckFailure>,
    },

    /// A provider call made while planning failed.
    #[error("Provider call for {urn} failed while planning: {source}")]
    ProviderFailed {
        /// Resource being planned.
        urn: Urn,
        /// Underlying provider error.
        #[source]
        source: ProviderError,
    },
}

/// Plan application errors.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// A step's provider call failed.
    #[error("Step #{step} [{op}] for {urn} failed ({status}): {message}")]
    StepFailed {
        /// One-based step number.
        step: usize,
        /// Operation of the failed step.
        op: StepOp,
        /// Resource the step acted on.
        urn: Urn,
        /// State the resource was left in.
        status: ResourceStatus,
        /// Provider message.
        message: String,
    },
}

/// Result type alias for Stratum operations.
pub type Result<T> = std::result::Result<T, StratumError>;

fn format_failures(failures: &[CheckFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.property, f.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

impl StratumError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error may have left resources in an unknown state.
    #[must_use]
    pub const fn is_catastrophic(&self) -> bool {
        matches!(
            self,
            Self::Apply(ApplyError::StepFailed {
                status: ResourceStatus::Unknown,
                ..
            }) | Self::Provider(ProviderError {
                status: ResourceStatus::Unknown,
                ..
            })
        )
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a validation error without a specific field.
    #[must_use]
    pub fn validation_general(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: None,
        }
    }
}

impl StateError {
    /// Creates an IO error tagged with the path it concerns.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Creates a corruption error for a file.
    #[must_use]
    pub fn corrupted(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Corrupted {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }
}

impl ProviderError {
    /// A failure that left the resource in a known-good state.
    #[must_use]
    pub fn recoverable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: ResourceStatus::Ok,
        }
    }

    /// A failure after which the resource's remote state is unknown.
    #[must_use]
    pub fn catastrophic(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: ResourceStatus::Unknown,
        }
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}
