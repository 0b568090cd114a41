//! Configuration module for the Stratum deployment system.
//!
//! This module handles all configuration-related functionality:
//! - Parsing desired-state documents (YAML or JSON)
//! - Validating resource names, type tokens and references
//! - Workspace settings and the current environment

mod parser;
mod spec;
mod validator;
mod workspace;

pub use parser::{find_config_file, ConfigParser, DEFAULT_CONFIG_FILES};
pub use spec::{DesiredState, ResourceSpec};
pub use validator::{validate_env_name, ConfigValidator, ValidationError, ValidationResult};
pub use workspace::{Workspace, WorkspaceSettings, ENV_ENV_VAR, HOME_ENV_VAR};
