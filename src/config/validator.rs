//! Validation for desired-state documents.
//!
//! This module checks a document before it is turned into a snapshot:
//! resource names must be unique and usable inside a URN, type tokens must
//! be well formed, and references must point at resources declared earlier.

use crate::error::{ConfigError, Result};
use std::collections::HashSet;
use tracing::debug;

use super::spec::{DesiredState, ResourceSpec};
use crate::resource::{ResourceRef, TypeToken};

/// Validator for desired-state documents.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a desired-state document.
    ///
    /// # Errors
    ///
    /// Returns the first validation error if any check fails.
    pub fn validate(&self, doc: &DesiredState) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();
        let mut declared: HashSet<&str> = HashSet::new();

        for (i, res) in doc.resources.iter().enumerate() {
            let field = format!("resources[{i}]");
            Self::validate_name(res, &field, &declared, &mut result);
            Self::validate_type(res, &field, &mut result);
            Self::validate_refs(doc, res, &field, &declared, &mut result);
            if res.properties.is_empty() {
                result
                    .warnings
                    .push(format!("Resource '{}' has no properties", res.name));
            }
            declared.insert(res.name.as_str());
        }

        if result.errors.is_empty() {
            debug!("Desired state validation passed ({} resources)", doc.resources.len());
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(ConfigError::validation(first_error.message.clone(), first_error.field.clone()).into())
        }
    }

    fn validate_name(res: &ResourceSpec, field: &str, declared: &HashSet<&str>, result: &mut ValidationResult) {
        if res.name.is_empty() {
            result.errors.push(ValidationError {
                field: format!("{field}.name"),
                message: String::from("Resource name cannot be empty"),
            });
        } else if !is_valid_name(&res.name) {
            result.errors.push(ValidationError {
                field: format!("{field}.name"),
                message: format!(
                    "Resource name '{}' is invalid. Must be alphanumeric with '-', '_' or '.'.",
                    res.name
                ),
            });
        } else if declared.contains(res.name.as_str()) {
            result.errors.push(ValidationError {
                field: format!("{field}.name"),
                message: format!("Duplicate resource name: {}", res.name),
            });
        }
    }

    fn validate_type(res: &ResourceSpec, field: &str, result: &mut ValidationResult) {
        if !TypeToken::new(res.type_token.clone()).is_well_formed() {
            result.errors.push(ValidationError {
                field: format!("{field}.type"),
                message: format!(
                    "Type '{}' of resource '{}' must have the form package:module:Type",
                    res.type_token, res.name
                ),
            });
        }
    }

    fn validate_refs(
        doc: &DesiredState,
        res: &ResourceSpec,
        field: &str,
        declared: &HashSet<&str>,
        result: &mut ValidationResult,
    ) {
        let mut targets = Vec::new();
        res.properties.visit_refs(&mut |r: &ResourceRef| {
            if !r.urn().is_qualified() {
                targets.push(r.urn().as_str().to_string());
            }
        });

        for target in targets {
            if declared.contains(target.as_str()) {
                continue;
            }
            let message = if target == res.name {
                format!("Resource '{}' refers to itself", res.name)
            } else if doc.get(&target).is_some() {
                format!(
                    "Resource '{}' refers to '{target}', which must be declared before it",
                    res.name
                )
            } else {
                format!("Resource '{}' refers to unknown resource '{target}'", res.name)
            };
            result.errors.push(ValidationError {
                field: format!("{field}.properties"),
                message,
            });
        }
    }
}

/// Checks that an environment name can be embedded in a URN and used as
/// an envfile name.
///
/// # Errors
///
/// Returns [`ConfigError::ValidationError`] if the name is empty, made only
/// of dots, or contains characters other than ASCII alphanumerics, `-`, `_`
/// and `.`.
pub fn validate_env_name(name: &str) -> Result<()> {
    if name.is_empty() || name.chars().all(|c| c == '.') || !is_valid_name(name) {
        return Err(ConfigError::validation(
            format!("Environment name '{name}' is invalid. Must be alphanumeric with '-', '_' or '.'."),
            "env",
        )
        .into());
    }
    Ok(())
}

/// Checks that a name can be embedded in a URN.
fn is_valid_name(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
