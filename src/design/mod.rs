//! Loading designs from documents

pub mod loader;

pub use loader::{DesignLoader, FileDesignLoader, parse_design};
