//! Design validation and finalization
//!
//! User-facing design problems are collected, not short-circuited, so a
//! single run reports every problem of a design at once.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use thiserror::Error;

use super::http::{ApiExpr, EndpointRef, ResponseExpr, extract_route_wildcards};
use super::mapped::MappedAttribute;
use super::schema::{AttributeSchema, DataType, TypeLookup};

/// A problem in the design provided by the user
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DesignError {
    #[error("{endpoint}: parameter {name:?} {reason}")]
    InvalidParameterShape {
        endpoint: String,
        name: String,
        reason: String,
    },

    #[error("{endpoint}: header {name:?} {reason}")]
    InvalidHeaderShape {
        endpoint: String,
        name: String,
        reason: String,
    },

    #[error("{endpoint}: routes {first:?} and {second:?} define different parameters")]
    RouteParameterMismatch {
        endpoint: String,
        first: String,
        second: String,
    },

    #[error("{endpoint}: {reason}")]
    AmbiguousResponseTag { endpoint: String, reason: String },

    #[error("{endpoint}: status code {status} is used by more than one response")]
    DuplicateStatusCode { endpoint: String, status: u16 },

    #[error("{endpoint}: attribute {name:?} is declared both as a parameter and as a header")]
    DuplicateAttribute { endpoint: String, name: String },

    #[error("{endpoint}: wildcard {name:?} of {path:?} is not a parameter or payload attribute")]
    UndefinedWildcard {
        endpoint: String,
        path: String,
        name: String,
    },
}

/// Every design error found in one validation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<DesignError>);

impl ValidationErrors {
    pub fn push(&mut self, error: DesignError) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DesignError> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Vec<DesignError> {
        self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "- {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl ApiExpr {
    /// Completes and validates the design.
    ///
    /// Named types receive their table key as name, endpoints without
    /// responses receive a default one, and the untagged response of every
    /// endpoint is moved last. The design is returned only if no
    /// [`DesignError`] was found.
    pub fn finalize(mut self) -> Result<ApiExpr, ValidationErrors> {
        for (key, user_type) in self.types.iter_mut() {
            if user_type.name.is_empty() {
                user_type.name = key.clone();
            }
        }
        for endpoint in self.services.iter_mut().flat_map(|s| s.endpoints.iter_mut()) {
            if endpoint.responses.is_empty() {
                let status = if endpoint.result.is_some() { 200 } else { 204 };
                endpoint.responses.push(ResponseExpr::new(status));
            }
        }

        let mut errors = ValidationErrors::default();
        for ep in self.endpoints() {
            validate_endpoint(&ep, &mut errors);
        }
        if !errors.is_empty() {
            tracing::debug!("Design {} has {} error(s)", self.name, errors.len());
            return Err(errors);
        }

        for endpoint in self.services.iter_mut().flat_map(|s| s.endpoints.iter_mut()) {
            order_responses(&mut endpoint.responses);
        }
        tracing::debug!(
            "Finalized design {} with {} service(s)",
            self.name,
            self.services.len()
        );
        Ok(self)
    }
}

/// Moves the untagged response, if any, to the end of the table.
pub fn order_responses(responses: &mut Vec<ResponseExpr>) {
    if let Some(pos) = responses.iter().position(|r| r.tag.is_none()) {
        if pos + 1 != responses.len() {
            let untagged = responses.remove(pos);
            responses.push(untagged);
        }
    }
}

fn validate_endpoint(ep: &EndpointRef<'_>, errors: &mut ValidationErrors) {
    let endpoint = ep.qualified_name();
    let types = ep.types();

    let params = ep.all_params();
    let wildcards = ep.wildcards();
    for (name, _, att) in params.sorted_by_wire() {
        let is_path = wildcards.iter().any(|w| w == name);
        if let Some(reason) = param_shape_error(att, is_path, types) {
            errors.push(DesignError::InvalidParameterShape {
                endpoint: endpoint.clone(),
                name: name.to_string(),
                reason,
            });
        }
    }
    for wire in params.duplicate_wire_names() {
        errors.push(DesignError::InvalidParameterShape {
            endpoint: endpoint.clone(),
            name: wire,
            reason: "is the wire name of more than one attribute".to_string(),
        });
    }
    if let Some(name) = &ep.endpoint.map_query_params {
        let att = ep
            .endpoint
            .payload
            .as_ref()
            .and_then(|p| p.as_object(types))
            .and_then(|obj| obj.get(name));
        let valid = att.is_some_and(|att| {
            att.is_map(types) && param_shape_error(att, false, types).is_none()
        });
        if !valid {
            errors.push(DesignError::InvalidParameterShape {
                endpoint: endpoint.clone(),
                name: name.clone(),
                reason: "must be a payload attribute of map type".to_string(),
            });
        }
    }

    let headers = ep.headers();
    validate_headers(&endpoint, &headers, types, errors);
    for name in params.names().filter(|name| headers.contains(name)) {
        errors.push(DesignError::DuplicateAttribute {
            endpoint: endpoint.clone(),
            name: name.to_string(),
        });
    }

    let paths = ep.full_paths();
    for path in &paths {
        for name in extract_route_wildcards(path) {
            if !params.contains(&name) {
                errors.push(DesignError::UndefinedWildcard {
                    endpoint: endpoint.clone(),
                    path: path.clone(),
                    name,
                });
            }
        }
    }
    if let Some((first, rest)) = paths.split_first() {
        let expected: BTreeSet<String> = extract_route_wildcards(first).into_iter().collect();
        for other in rest {
            let actual: BTreeSet<String> = extract_route_wildcards(other).into_iter().collect();
            if actual != expected {
                errors.push(DesignError::RouteParameterMismatch {
                    endpoint: endpoint.clone(),
                    first: first.clone(),
                    second: other.clone(),
                });
            }
        }
    }

    validate_responses(ep, &endpoint, errors);
    for response in &ep.endpoint.responses {
        validate_headers(&endpoint, &response.headers, types, errors);
    }
    for error in ep.errors() {
        validate_headers(&endpoint, &error.response.headers, types, errors);
    }
}

fn validate_headers(
    endpoint: &str,
    headers: &MappedAttribute,
    types: &dyn TypeLookup,
    errors: &mut ValidationErrors,
) {
    for (name, _, att) in headers.sorted_by_wire() {
        if let Some(reason) = header_shape_error(att, types) {
            errors.push(DesignError::InvalidHeaderShape {
                endpoint: endpoint.to_string(),
                name: name.to_string(),
                reason,
            });
        }
    }
    for wire in headers.duplicate_wire_names() {
        errors.push(DesignError::InvalidHeaderShape {
            endpoint: endpoint.to_string(),
            name: wire,
            reason: "is the wire name of more than one attribute".to_string(),
        });
    }
}

fn validate_responses(ep: &EndpointRef<'_>, endpoint: &str, errors: &mut ValidationErrors) {
    let responses = &ep.endpoint.responses;
    let mut seen = HashSet::new();
    for response in responses {
        if !seen.insert(response.status) {
            errors.push(DesignError::DuplicateStatusCode {
                endpoint: endpoint.to_string(),
                status: response.status,
            });
        }
    }

    let untagged = responses.iter().filter(|r| r.tag.is_none()).count();
    let tagged: Vec<&ResponseExpr> = responses.iter().filter(|r| r.tag.is_some()).collect();
    if untagged > 1 {
        errors.push(DesignError::AmbiguousResponseTag {
            endpoint: endpoint.to_string(),
            reason: format!("{untagged} responses define no tag, at most one may be the default"),
        });
    }
    if !tagged.is_empty() && untagged == 0 {
        errors.push(DesignError::AmbiguousResponseTag {
            endpoint: endpoint.to_string(),
            reason: "every response defines a tag, one response must be the default".to_string(),
        });
    }

    let types = ep.types();
    for tag in tagged.iter().filter_map(|r| r.tag.as_ref()) {
        let reason = match &ep.endpoint.result {
            Some(result) => match result.as_object(types) {
                Some(obj) if !obj.contains(&tag.attribute) => {
                    Some(format!("tag attribute {:?} is not a result attribute", tag.attribute))
                }
                Some(_) if !result.is_required(&tag.attribute, types) => {
                    Some(format!("tag attribute {:?} must be required", tag.attribute))
                }
                Some(_) => None,
                None => Some(format!(
                    "tag attribute {:?} requires an object result",
                    tag.attribute
                )),
            },
            None => Some(format!(
                "tag attribute {:?} requires an object result",
                tag.attribute
            )),
        };
        if let Some(reason) = reason {
            errors.push(DesignError::AmbiguousResponseTag {
                endpoint: endpoint.to_string(),
                reason,
            });
        }
    }
}

fn param_shape_error(
    att: &AttributeSchema,
    is_path: bool,
    types: &dyn TypeLookup,
) -> Option<String> {
    let resolved = att.resolve(types).ok()?;
    match &resolved.data_type {
        DataType::Object(_) => {
            Some("must be a primitive, an array or a map, not an object".to_string())
        }
        DataType::Map { .. } if is_path => {
            Some("is a path parameter and cannot be a map".to_string())
        }
        DataType::Map { key, elem } => {
            let elem_ok = elem.is_primitive(types)
                || elem
                    .resolve(types)
                    .ok()
                    .and_then(|e| match &e.data_type {
                        DataType::Array(inner) => Some(inner.is_primitive(types)),
                        _ => None,
                    })
                    .unwrap_or(false);
            if key.is_primitive(types) && elem_ok {
                None
            } else {
                Some("must map primitives to primitives or arrays of primitives".to_string())
            }
        }
        DataType::Array(elem) if !elem.is_primitive(types) => {
            Some("is an array whose elements are not primitive".to_string())
        }
        _ => None,
    }
}

fn header_shape_error(att: &AttributeSchema, types: &dyn TypeLookup) -> Option<String> {
    let resolved = att.resolve(types).ok()?;
    match &resolved.data_type {
        DataType::Object(_) => Some("cannot be an object".to_string()),
        DataType::Array(elem) if !elem.is_primitive(types) => {
            Some("is an array whose elements are not primitive".to_string())
        }
        _ => None,
    }
}
