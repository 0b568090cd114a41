//! Resource identity: URNs, provider-assigned IDs and type tokens.

use serde::{Deserialize, Serialize};
use std::fmt;

/// URN scheme prefix.
const URN_PREFIX: &str = "urn:stratum:";

/// Separator between URN segments.
const URN_SEP: &str = "::";

/// Stable logical identifier of a resource: `urn:stratum:<env>::<type>::<name>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Urn(String);

/// Physical identifier assigned to a resource by its provider.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

/// Resource type token, `package:module:Type`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeToken(String);

impl Urn {
    /// Builds a URN from its parts.
    #[must_use]
    pub fn new(environment: &str, type_token: &str, name: &str) -> Self {
        Self(format!("{URN_PREFIX}{environment}{URN_SEP}{type_token}{URN_SEP}{name}"))
    }

    /// Wraps a string that is already a URN (or a bare short name).
    #[must_use]
    pub fn parse(s: &str) -> Self {
        Self(s.to_string())
    }

    /// Returns true if the string carries the full URN prefix.
    #[must_use]
    pub fn is_qualified(&self) -> bool {
        self.0.starts_with(URN_PREFIX)
    }

    /// The resource's short name (last segment).
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.rsplit(URN_SEP).next().unwrap_or(&self.0)
    }

    /// The full URN text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ResourceId {
    /// Wraps a provider-assigned identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TypeToken {
    /// Wraps a type token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The package segment, which selects the provider.
    #[must_use]
    pub fn package(&self) -> &str {
        self.0.split(':').next().unwrap_or_default()
    }

    /// Returns true if the token has the `package:module:Type` shape.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        let parts: Vec<&str> = self.0.split(':').collect();
        parts.len() == 3 && parts.iter().all(|p| !p.is_empty())
    }

    /// The token text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
