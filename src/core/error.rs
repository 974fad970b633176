//! Error handling for the wirecodegen schema compiler.
//!
//! This module defines the main error type `Error` used throughout the library,
//! along with a convenient `Result` type alias. It uses `thiserror` for easy
//! error handling and implements conversions from common error types.
//!
//! Two families of failures exist. User-facing design problems are collected in
//! [`ValidationErrors`] by [`ApiExpr::finalize`](crate::expr::ApiExpr::finalize)
//! and surface here only wrapped in [`Error::Design`]. Every other variant that
//! is not an I/O or parsing wrapper signals a broken pipeline invariant: the
//! upstream evaluator handed over a model that should have been impossible.
//!
//! # Examples
//!
//! ```
//! use wirecodegen::core::error::{Error, Result};
//!
//! fn lookup(name: &str) -> Result<()> {
//!     Err(Error::unknown_attribute(name))
//! }
//!
//! assert!(lookup("id").unwrap_err().is_internal());
//! ```

use thiserror::Error;

use crate::expr::ValidationErrors;

/// Result type for wirecodegen operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for wirecodegen operations
#[derive(Debug, Error)]
pub enum Error {
    /// A logical or wire name is not part of the underlying schema
    #[error("unknown attribute {0:?}")]
    UnknownAttribute(String),

    /// A projection referenced a view the result type does not declare
    #[error("type {type_name:?} has no view {view:?}")]
    UnresolvedView { type_name: String, view: String },

    /// A named type reference does not resolve
    #[error("unresolved type {0:?}")]
    UnresolvedType(String),

    /// A structural transform was requested between incompatible shapes
    #[error("cannot transform {source_type} into {target_type}")]
    IncompatibleTypes {
        source_type: String,
        target_type: String,
    },

    /// A path template was rendered with the wrong number of values
    #[error("path template {template} takes {expected} value(s), got {actual}")]
    TemplateArity {
        template: String,
        expected: usize,
        actual: usize,
    },

    /// Two attributes of a mapped attribute would share a wire name
    #[error("wire name {wire:?} already carries attribute {owner:?}")]
    DuplicateWireName { wire: String, owner: String },

    /// The design failed validation
    #[error("invalid design:\n{0}")]
    Design(#[from] ValidationErrors),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Create a new unknown attribute error
    pub fn unknown_attribute<S: Into<String>>(name: S) -> Self {
        Self::UnknownAttribute(name.into())
    }

    /// Create a new unresolved view error
    pub fn unresolved_view<T: Into<String>, V: Into<String>>(type_name: T, view: V) -> Self {
        Self::UnresolvedView {
            type_name: type_name.into(),
            view: view.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the error reports a pipeline bug rather than bad input.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Error::UnknownAttribute(_)
                | Error::UnresolvedView { .. }
                | Error::UnresolvedType(_)
                | Error::IncompatibleTypes { .. }
        )
    }
}
