//! Lookup of providers by type token package.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{PlanError, Result};
use crate::resource::TypeToken;

use super::Provider;

/// Maps type-token packages (`aws`, `local`, ...) to providers.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider for a package, replacing any previous one.
    #[must_use]
    pub fn with_provider(mut self, package: impl Into<String>, provider: Arc<dyn Provider>) -> Self {
        self.register(package, provider);
        self
    }

    /// Registers a provider for a package, replacing any previous one.
    pub fn register(&mut self, package: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(package.into(), provider);
    }

    /// Finds the provider serving a type.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::MissingProvider`] if no provider serves the package.
    pub fn provider_for(&self, type_token: &TypeToken) -> Result<&Arc<dyn Provider>> {
        self.providers.get(type_token.package()).ok_or_else(|| {
            PlanError::MissingProvider {
                type_token: type_token.to_string(),
            }
            .into()
        })
    }

    /// Registered package names, sorted.
    #[must_use]
    pub fn packages(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("packages", &self.packages())
            .finish()
    }
}
