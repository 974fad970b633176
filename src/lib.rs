//! Structural schema compiler for HTTP transport code generation.
//!
//! A design ([`expr::ApiExpr`]) describes services, endpoints and the types
//! they exchange. [`codegen::compile`] splits every payload, result and error
//! into path parameters, query parameters, headers and a body, synthesizes the
//! wire types and the functions converting between wire and logical values,
//! and returns per-service data ready to be rendered.

pub mod codegen;
pub mod core;
pub mod design;
pub mod expr;

pub use codegen::{RenderContext, ServiceData, compile};
pub use crate::core::{CompilerConfig, Error, Result};
pub use design::{DesignLoader, FileDesignLoader};
pub use expr::ApiExpr;
