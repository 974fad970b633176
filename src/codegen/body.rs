//! Body type synthesis
//!
//! The body of a request, response or error is what is left of the logical
//! type once the attributes carried by the path, the query string and the
//! headers are removed. Object bodies become new named types, and every named
//! type they reference is duplicated under a suffixed name so wire types and
//! logical types never mix.

use serde::Serialize;

use super::context::ServiceScope;
use super::validation::validate_data;
use crate::core::error::{Error, Result};
use crate::core::utils::goify;
use crate::expr::view::project;
use crate::expr::{
    AttributeSchema, BodyDecl, DataType, EndpointRef, ErrorExpr, ObjectSchema, ResponseExpr,
    TypeLookup, UserType, ViewExpr,
};

/// Suffix of the types synthesized for request bodies
pub const REQUEST_BODY_SUFFIX: &str = "RequestBody";
/// Suffix of the types synthesized for response and error bodies
pub const RESPONSE_BODY_SUFFIX: &str = "ResponseBody";

/// Body of a request, response or error
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BodyData {
    /// Named body type, `None` when the body is a primitive, array or map
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    /// The body attribute, a reference to `type_name` when set
    pub attribute: AttributeSchema,
    /// Payload or result attribute the body stands for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    /// Validator of the body type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validate: Option<String>,
    /// Body types of the views of a projectable result
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub views: Vec<ViewBodyData>,
}

/// Body type rendering one view of a result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewBodyData {
    pub view: String,
    pub type_name: String,
}

/// Name of the request body type of an endpoint
pub fn request_body_name(endpoint: &str) -> String {
    format!("{}{REQUEST_BODY_SUFFIX}", goify(endpoint, true))
}

/// Name of a response body type, qualified by the status when the endpoint
/// has more than one response.
pub fn response_body_name(endpoint: &str, response: &ResponseExpr, responses: usize) -> String {
    let status = if responses > 1 {
        response.status_text()
    } else {
        String::new()
    };
    format!("{}{status}{RESPONSE_BODY_SUFFIX}", goify(endpoint, true))
}

/// Name of the body type of an error response
pub fn error_body_name(endpoint: &str, error: &str) -> String {
    format!(
        "{}{}{RESPONSE_BODY_SUFFIX}",
        goify(endpoint, true),
        goify(error, true)
    )
}

/// Request body of `ep`, `None` when everything travels outside the body.
pub fn request_body(
    scope: &mut ServiceScope<'_>,
    ep: &EndpointRef<'_>,
) -> Result<Option<BodyData>> {
    let Some(payload) = &ep.endpoint.payload else {
        return Ok(None);
    };
    let mut claimed: Vec<String> = ep.all_params().names().map(str::to_string).collect();
    claimed.extend(ep.headers().names().map(str::to_string));
    claimed.extend(ep.endpoint.map_query_params.iter().cloned());

    let body = synthesize(
        scope,
        BodySource {
            logical: payload,
            decl: ep.endpoint.body.as_ref(),
            claimed,
            name: request_body_name(&ep.endpoint.name),
            suffix: REQUEST_BODY_SUFFIX,
            views: Vec::new(),
        },
    )?;
    log_body(ep, "request", &body);
    Ok(body)
}

/// Body of one response of `ep`.
///
/// A selected view narrows the result before the headers are removed. When
/// no view is selected and the result is projectable, every view also gets
/// a body type.
pub fn response_body(
    scope: &mut ServiceScope<'_>,
    ep: &EndpointRef<'_>,
    response: &ResponseExpr,
) -> Result<Option<BodyData>> {
    let Some(result) = &ep.endpoint.result else {
        return Ok(None);
    };
    let logical = match &response.view {
        Some(view) => project(result, view, &*scope)?,
        None => result.clone(),
    };
    let claimed: Vec<String> = response.headers.names().map(str::to_string).collect();
    let name = response_body_name(&ep.endpoint.name, response, ep.endpoint.responses.len());

    let views = if response.view.is_none() {
        stripped_views(result, &claimed, &*scope)
    } else {
        Vec::new()
    };

    let mut body = synthesize(
        scope,
        BodySource {
            logical: &logical,
            decl: response.body.as_ref(),
            claimed: claimed.clone(),
            name: name.clone(),
            suffix: RESPONSE_BODY_SUFFIX,
            views: views.clone(),
        },
    )?;

    if let Some(body) = body.as_mut().filter(|b| b.type_name.is_some() && b.origin.is_none()) {
        for view in &views {
            let projected = project(result, &view.name, &*scope)?;
            let source = BodySource {
                logical: &projected,
                decl: None,
                claimed: claimed.clone(),
                name: format!("{name}{}", goify(&view.name, true)),
                suffix: RESPONSE_BODY_SUFFIX,
                views: Vec::new(),
            };
            if let Some(type_name) = synthesize(scope, source)?.and_then(|b| b.type_name) {
                body.views.push(ViewBodyData {
                    view: view.name.clone(),
                    type_name,
                });
            }
        }
    }
    log_body(ep, "response", &body);
    Ok(body)
}

/// Body of the response of error `error` of `ep`
pub fn error_body(
    scope: &mut ServiceScope<'_>,
    ep: &EndpointRef<'_>,
    error: &ErrorExpr,
) -> Result<Option<BodyData>> {
    let claimed = error.response.headers.names().map(str::to_string).collect();
    let body = synthesize(
        scope,
        BodySource {
            logical: &error.schema,
            decl: error.response.body.as_ref(),
            claimed,
            name: error_body_name(&ep.endpoint.name, &error.name),
            suffix: RESPONSE_BODY_SUFFIX,
            views: Vec::new(),
        },
    )?;
    log_body(ep, "error", &body);
    Ok(body)
}

fn log_body(ep: &EndpointRef<'_>, kind: &str, body: &Option<BodyData>) {
    match body.as_ref().and_then(|b| b.type_name.as_deref()) {
        Some(name) => tracing::debug!("{} {kind} body is {name}", ep.qualified_name()),
        None if body.is_some() => tracing::debug!("{} {kind} body is unnamed", ep.qualified_name()),
        None => tracing::debug!("{} has an empty {kind} body", ep.qualified_name()),
    }
}

/// Views of the type `result` refers to, without the attributes carried
/// by headers.
fn stripped_views(
    result: &AttributeSchema,
    claimed: &[String],
    types: &dyn TypeLookup,
) -> Vec<ViewExpr> {
    let Some(user_type) = result.data_type.user_type_name().and_then(|n| types.lookup(n)) else {
        return Vec::new();
    };
    user_type
        .views
        .iter()
        .map(|view| ViewExpr {
            name: view.name.clone(),
            attributes: view
                .attributes
                .iter()
                .filter(|a| !claimed.contains(&a.name))
                .cloned()
                .collect(),
        })
        .collect()
}

struct BodySource<'x> {
    /// Logical type the body is carved from
    logical: &'x AttributeSchema,
    decl: Option<&'x BodyDecl>,
    /// Logical attributes carried outside the body
    claimed: Vec<String>,
    /// Name of the body type if one is synthesized
    name: String,
    suffix: &'static str,
    views: Vec<ViewExpr>,
}

fn synthesize(scope: &mut ServiceScope<'_>, source: BodySource<'_>) -> Result<Option<BodyData>> {
    match source.decl {
        Some(BodyDecl::Schema(att)) => return explicit(scope, att, None, &source).map(Some),
        Some(BodyDecl::Attribute(origin)) => {
            let att = source
                .logical
                .as_object(&*scope)
                .and_then(|obj| obj.get(origin))
                .cloned()
                .ok_or_else(|| Error::unknown_attribute(origin.as_str()))?;
            return explicit(scope, &att, Some(origin.clone()), &source).map(Some);
        }
        None => {}
    }

    let resolved = source.logical.resolve(&*scope)?.clone();
    let DataType::Object(object) = &resolved.data_type else {
        if source.claimed.is_empty() {
            return explicit(scope, source.logical, None, &source).map(Some);
        }
        return Ok(None);
    };

    let mut remaining = object.clone();
    for name in &source.claimed {
        remaining.remove(name);
    }
    if remaining.is_empty() {
        return Ok(None);
    }
    let mut validation = resolved.validation.clone();
    validation.required.retain(|r| remaining.contains(r));
    let body = AttributeSchema {
        data_type: DataType::Object(remaining),
        description: resolved.description.clone(),
        default: None,
        validation,
    };
    declare_body(scope, body, None, &source).map(Some)
}

/// A body declared explicitly. Objects are renamed to the body name, other
/// shapes keep their form with suffixed nested types.
fn explicit(
    scope: &mut ServiceScope<'_>,
    att: &AttributeSchema,
    origin: Option<String>,
    source: &BodySource<'_>,
) -> Result<BodyData> {
    let resolved = att.resolve(&*scope)?.clone();
    if resolved.is_object(&*scope) {
        let mut body = resolved;
        if att.description.is_some() {
            body.description = att.description.clone();
        }
        return declare_body(scope, body, origin, source);
    }
    let attribute = append_suffix(scope, att, source.suffix)?;
    Ok(BodyData {
        type_name: None,
        attribute,
        origin,
        validate: None,
        views: Vec::new(),
    })
}

fn declare_body(
    scope: &mut ServiceScope<'_>,
    body: AttributeSchema,
    origin: Option<String>,
    source: &BodySource<'_>,
) -> Result<BodyData> {
    // reserved before the nested copies so none of them can take the name
    let name = scope.claim_unique(&source.name);
    let attribute = append_suffix_fields(scope, &body, source.suffix)?;
    scope.define(UserType::new(name.as_str(), attribute).with_views(source.views.clone()));
    tracing::trace!("Synthesized body type {name}");
    let reference = AttributeSchema::user(name.as_str());
    let validate = validate_data(&name, &reference, &*scope).map(|v| v.name);
    Ok(BodyData {
        type_name: Some(name),
        attribute: reference,
        origin,
        validate,
        views: Vec::new(),
    })
}

/// Suffixes the named types referenced by the fields of `body`, keeping
/// `body` itself anonymous.
fn append_suffix_fields(
    scope: &mut ServiceScope<'_>,
    body: &AttributeSchema,
    suffix: &str,
) -> Result<AttributeSchema> {
    let DataType::Object(object) = &body.data_type else {
        return append_suffix(scope, body, suffix);
    };
    let mut fields = ObjectSchema::new();
    for (name, field) in object.iter() {
        fields.insert(name, append_suffix(scope, field, suffix)?);
    }
    Ok(AttributeSchema {
        data_type: DataType::Object(fields),
        ..body.clone()
    })
}

/// Rewrites every reference to a named object type reachable from `att` to
/// `<name><suffix>`, declaring the suffixed copies in `scope` once.
pub fn append_suffix(
    scope: &mut ServiceScope<'_>,
    att: &AttributeSchema,
    suffix: &str,
) -> Result<AttributeSchema> {
    append_suffix_rec(scope, att, suffix, &mut Vec::new())
}

fn append_suffix_rec(
    scope: &mut ServiceScope<'_>,
    att: &AttributeSchema,
    suffix: &str,
    aliases: &mut Vec<String>,
) -> Result<AttributeSchema> {
    let mut out = att.clone();
    match &att.data_type {
        DataType::Primitive(_) => {}
        DataType::User(name) => {
            let user_type = scope.resolve(name)?.clone();
            if !user_type.attribute.is_object(&*scope) {
                if aliases.contains(name) {
                    return Ok(out);
                }
                aliases.push(name.clone());
                let inner = append_suffix_rec(scope, &user_type.attribute, suffix, aliases)?;
                aliases.pop();
                return Ok(AttributeSchema {
                    description: att.description.clone().or(inner.description.clone()),
                    default: att.default.clone().or(inner.default.clone()),
                    ..inner
                });
            }
            if let Some(copy) = scope.copy_of(name, suffix) {
                out.data_type = DataType::User(copy.to_string());
                return Ok(out);
            }
            let renamed = scope.claim_unique(&format!("{name}{suffix}"));
            scope.record_copy(name, suffix, &renamed);
            let resolved = user_type.attribute.resolve(&*scope)?.clone();
            let attribute = append_suffix_fields(scope, &resolved, suffix)?;
            scope.define(UserType {
                name: renamed.clone(),
                attribute,
                views: user_type.views.clone(),
            });
            out.data_type = DataType::User(renamed);
        }
        DataType::Array(elem) => {
            let elem = append_suffix_rec(scope, elem, suffix, aliases)?;
            out.data_type = DataType::Array(Box::new(elem));
        }
        DataType::Map { key, elem } => {
            out.data_type = DataType::Map {
                key: Box::new(append_suffix_rec(scope, key, suffix, aliases)?),
                elem: Box::new(append_suffix_rec(scope, elem, suffix, aliases)?),
            };
        }
        DataType::Object(object) => {
            let mut fields = ObjectSchema::new();
            for (name, field) in object.iter() {
                fields.insert(name, append_suffix_rec(scope, field, suffix, aliases)?);
            }
            out.data_type = DataType::Object(fields);
        }
    }
    Ok(out)
}
