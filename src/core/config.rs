//! Compiler configuration.
//!
//! [`CompilerConfig`] narrows a compilation run to a subset of the design:
//!
//! - Service filtering (compile only the named services)
//! - Endpoint filtering (include/exclude specific endpoints)
//!
//! # Example
//!
//! ```rust
//! use wirecodegen::core::config::CompilerConfig;
//!
//! let config = CompilerConfig::from_toml_str(
//!     r#"
//! services = ["account"]
//! exclude_endpoints = ["delete"]
//! "#,
//! )
//! .unwrap();
//! assert!(config.should_compile("account", "show"));
//! assert!(!config.should_compile("account", "delete"));
//! assert!(!config.should_compile("billing", "show"));
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, Result};

/// Configuration controlling which parts of a design get compiled.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Services to compile; empty means every service
    pub services: Vec<String>,

    /// Specific endpoints to include (overrides the default of all endpoints if not empty)
    pub include_endpoints: Vec<String>,

    /// Endpoints to exclude
    pub exclude_endpoints: Vec<String>,
}

impl CompilerConfig {
    /// Parse a configuration from TOML
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration from JSON
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file. `.json` files are read as JSON, anything
    /// else as TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        tracing::debug!("Loading compiler configuration from {}", path.display());
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_toml_str(&content),
        }
    }

    /// Reject contradictory filters
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = self
            .include_endpoints
            .iter()
            .find(|name| self.exclude_endpoints.contains(name))
        {
            return Err(Error::config(format!(
                "endpoint {name:?} is both included and excluded"
            )));
        }
        Ok(())
    }

    /// Whether the endpoint of the given service is part of this run
    pub fn should_compile(&self, service: &str, endpoint: &str) -> bool {
        if !self.services.is_empty() && !self.services.iter().any(|s| s == service) {
            return false;
        }
        if self.exclude_endpoints.iter().any(|e| e == endpoint) {
            return false;
        }
        self.include_endpoints.is_empty() || self.include_endpoints.iter().any(|e| e == endpoint)
    }

    /// Whether any endpoint of the service may be part of this run
    pub fn includes_service(&self, service: &str) -> bool {
        self.services.is_empty() || self.services.iter().any(|s| s == service)
    }
}
