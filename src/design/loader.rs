//! File-based design loader
//!
//! Reads a design document and finalizes it. Parsing follows the file
//! extension: `.json` is JSON, `.yaml` and `.yml` are YAML, anything else is
//! tried as JSON then YAML.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::core::error::{Error, Result};
use crate::expr::ApiExpr;

/// Source of a finalized design
#[async_trait]
pub trait DesignLoader: Send + Sync {
    async fn load(&self) -> Result<ApiExpr>;
}

/// Loads a design from a local file
#[derive(Debug, Clone)]
pub struct FileDesignLoader {
    path: PathBuf,
}

impl FileDesignLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DesignLoader for FileDesignLoader {
    async fn load(&self) -> Result<ApiExpr> {
        let content = fs::read_to_string(&self.path).await?;
        tracing::debug!("Loaded design document {}", self.path.display());
        let ext = self.path.extension().and_then(|ext| ext.to_str());
        let api = parse_design(&content, ext)?;
        Ok(api.finalize()?)
    }
}

/// Parses a design document without finalizing it.
pub fn parse_design(content: &str, ext: Option<&str>) -> Result<ApiExpr> {
    match ext {
        Some("json") => Ok(serde_json::from_str(content)?),
        Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(content)?),
        _ => serde_json::from_str(content).or_else(|json_err| {
            serde_yaml::from_str(content).map_err(|yaml_err| {
                Error::config(format!(
                    "design is neither JSON ({json_err}) nor YAML ({yaml_err})"
                ))
            })
        }),
    }
}
