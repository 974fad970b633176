//! Render context handed to output templates

use serde_json::{Value as JsonValue, json};

use super::service::ServiceData;
use crate::core::error::Result;

/// JSON document describing the compiled services
#[derive(Debug, Clone, PartialEq)]
pub struct RenderContext {
    pub data: JsonValue,
}

impl RenderContext {
    /// Builds a context whose `services` entry lists `services`.
    pub fn from_services(services: &[ServiceData]) -> Result<Self> {
        Ok(Self {
            data: json!({ "services": serde_json::to_value(services)? }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_services() {
        let context = RenderContext::from_services(&[]).unwrap();
        assert_eq!(context.data, json!({ "services": [] }));
    }
}
