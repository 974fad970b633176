//! Shared infrastructure: errors, configuration and identifier utilities.

pub mod config;
pub mod error;
pub mod utils;

pub use config::CompilerConfig;
pub use error::{Error, Result};
