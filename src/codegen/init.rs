//! Constructors rebuilding logical values from decoded wire parts
//!
//! A payload, result or error travelling over HTTP is split into a body,
//! path parameters, query parameters and headers. The generated `Init`
//! functions take those parts as arguments and reassemble the logical value.

use serde::Serialize;
use serde_json::Value as JsonValue;

use super::body::BodyData;
use super::context::ServiceScope;
use super::policy::{Glue, Location, StoragePolicy, storage_policy};
use super::transform::{TransformPlan, transform};
use crate::core::error::{Error, Result};
use crate::core::utils::{NameScope, goify};
use crate::expr::{AttributeSchema, DataType, EndpointRef, ErrorExpr, MappedAttribute, ResponseExpr};

/// Argument of a constructor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitArgData {
    /// Logical name, `body` for the body argument
    pub name: String,
    pub var_name: String,
    /// Field of the constructed value the argument is stored into, `None`
    /// when the argument is the whole value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    pub type_name: String,
    pub location: Location,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<JsonValue>,
    pub policy: StoragePolicy,
    pub glue: Glue,
}

/// Conversion of the body argument into the constructed value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BodyTransformData {
    pub plan: TransformPlan,
    /// Field receiving the converted body when the body stands for a single
    /// attribute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_field: Option<String>,
}

/// Constructor descriptor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitData {
    pub name: String,
    pub description: String,
    pub args: Vec<InitArgData>,
    pub return_type: String,
    pub return_is_struct: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_transform: Option<BodyTransformData>,
}

/// Whether building `att` from wire parts needs a constructor, that is
/// whether it is or contains a named type.
pub fn need_init(att: &AttributeSchema) -> bool {
    match &att.data_type {
        DataType::Primitive(_) => false,
        DataType::User(_) => true,
        DataType::Array(elem) => need_init(elem),
        DataType::Map { key, elem } => need_init(key) || need_init(elem),
        DataType::Object(obj) => obj.iter().any(|(_, f)| need_init(f)),
    }
}

/// Identifier of the type of `att`, `fallback` for anonymous types
fn type_ident(att: &AttributeSchema, fallback: &str) -> String {
    match &att.data_type {
        DataType::User(name) => goify(name, true),
        _ => fallback.to_string(),
    }
}

/// Constructor of the payload of `ep` from its request parts.
pub fn payload_init(
    scope: &mut ServiceScope<'_>,
    ep: &EndpointRef<'_>,
    body: Option<&BodyData>,
) -> Result<Option<InitData>> {
    let Some(payload) = &ep.endpoint.payload else {
        return Ok(None);
    };
    let endpoint = goify(&ep.endpoint.name, true);
    let name = format!("New{endpoint}{}", type_ident(payload, &format!("{endpoint}Payload")));

    let mut query = ep.query_params();
    if let Some(map_param) = &ep.endpoint.map_query_params {
        if let Some(att) = payload.as_object(ep.types()).and_then(|o| o.get(map_param)) {
            let required = payload.is_required(map_param, ep.types());
            query.insert(map_param, att.clone(), required);
        }
    }
    let path = ep.path_params();
    let headers = ep.headers();
    build_init(
        scope,
        InitSpec {
            name,
            description: format!(
                "builds a {} service {} endpoint payload",
                ep.service.name, ep.endpoint.name
            ),
            target: payload,
            body,
            parts: &[
                (Location::Path, &path),
                (Location::Query, &query),
                (Location::Header, &headers),
            ],
        },
    )
}

/// Constructor of the result of `ep` from one of its responses.
pub fn result_init(
    scope: &mut ServiceScope<'_>,
    ep: &EndpointRef<'_>,
    response: &ResponseExpr,
    body: Option<&BodyData>,
) -> Result<Option<InitData>> {
    let Some(result) = &ep.endpoint.result else {
        return Ok(None);
    };
    let endpoint = goify(&ep.endpoint.name, true);
    let status = if ep.endpoint.responses.len() > 1 {
        response.status_text()
    } else {
        String::new()
    };
    let name = format!(
        "New{endpoint}{}{status}",
        type_ident(result, &format!("{endpoint}Result"))
    );
    let headers = with_value_attributes(&response.headers, result, scope);
    build_init(
        scope,
        InitSpec {
            name,
            description: format!(
                "builds a {} service {} endpoint result from a HTTP \"{}\" response",
                ep.service.name,
                ep.endpoint.name,
                response.status_text()
            ),
            target: result,
            body,
            parts: &[(Location::Header, &headers)],
        },
    )
}

/// Constructor of the error `error` of `ep` from its response.
pub fn error_init(
    scope: &mut ServiceScope<'_>,
    ep: &EndpointRef<'_>,
    error: &ErrorExpr,
    body: Option<&BodyData>,
) -> Result<Option<InitData>> {
    let name = format!(
        "New{}{}",
        goify(&ep.endpoint.name, true),
        goify(&error.name, true)
    );
    let headers = with_value_attributes(&error.response.headers, &error.schema, scope);
    build_init(
        scope,
        InitSpec {
            name,
            description: format!(
                "builds a {} service {} endpoint {} error",
                ep.service.name, ep.endpoint.name, error.name
            ),
            target: &error.schema,
            body,
            parts: &[(Location::Header, &headers)],
        },
    )
}

/// Takes header types and requiredness from the value they are part of.
pub(crate) fn with_value_attributes(
    headers: &MappedAttribute,
    value: &AttributeSchema,
    scope: &ServiceScope<'_>,
) -> MappedAttribute {
    let mut headers = headers.clone();
    if let Some(obj) = value.as_object(scope) {
        let names: Vec<String> = headers.names().map(str::to_string).collect();
        for name in names {
            if let Some(att) = obj.get(&name) {
                headers.insert(&name, att.clone(), value.is_required(&name, scope));
            }
        }
    }
    headers
}

struct InitSpec<'x> {
    name: String,
    description: String,
    target: &'x AttributeSchema,
    body: Option<&'x BodyData>,
    /// Non-body parts in argument order
    parts: &'x [(Location, &'x MappedAttribute)],
}

fn build_init(scope: &mut ServiceScope<'_>, spec: InitSpec<'_>) -> Result<Option<InitData>> {
    if !need_init(spec.target) {
        return Ok(None);
    }
    let object = spec.target.as_object(&*scope).cloned();
    let mut names = NameScope::new();
    let mut args = Vec::new();
    let mut body_transform = None;

    if let Some(body) = spec.body {
        let policy = storage_policy(true, false, Location::Body);
        args.push(InitArgData {
            name: "body".to_string(),
            var_name: names.unique("body"),
            field_name: None,
            type_name: body
                .type_name
                .clone()
                .unwrap_or_else(|| body.attribute.data_type.to_string()),
            location: Location::Body,
            required: true,
            default: None,
            policy,
            glue: Glue::None,
        });

        let (target, origin_field) = match &body.origin {
            Some(origin) => {
                let field = object
                    .as_ref()
                    .and_then(|o| o.get(origin))
                    .cloned()
                    .ok_or_else(|| Error::unknown_attribute(origin.as_str()))?;
                (field, Some(goify(origin, true)))
            }
            None => (spec.target.clone(), None),
        };
        body_transform = Some(BodyTransformData {
            plan: transform(scope, &body.attribute, &target)?,
            origin_field,
        });
    }

    for (location, mapped) in spec.parts {
        for (logical, _wire, att) in mapped.sorted_by_wire() {
            let (field_name, required) = match &object {
                Some(obj) if !obj.contains(logical) => continue,
                Some(_) => (
                    Some(goify(logical, true)),
                    spec.target.is_required(logical, &*scope),
                ),
                None => (None, true),
            };
            let policy = storage_policy(required, att.default.is_some(), *location);
            args.push(InitArgData {
                name: logical.to_string(),
                var_name: names.unique(&goify(logical, false)),
                field_name,
                type_name: att.data_type.to_string(),
                location: *location,
                required,
                default: att.default.clone(),
                policy,
                glue: policy.decode_glue(),
            });
        }
    }

    tracing::trace!("Constructor {} takes {} argument(s)", spec.name, args.len());
    Ok(Some(InitData {
        name: spec.name,
        description: spec.description,
        args,
        return_type: spec.target.data_type.to_string(),
        return_is_struct: object.is_some(),
        body_transform,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::body::request_body;
    use crate::expr::{
        ApiExpr, EndpointExpr, ObjectSchema, Primitive, ServiceExpr, UserType, Validation, Verb,
    };

    fn mapped(names: &[&str]) -> MappedAttribute {
        let mut obj = ObjectSchema::new();
        for name in names {
            obj.insert(*name, AttributeSchema::string());
        }
        MappedAttribute::from_object(obj, Validation::default())
    }

    fn api(endpoint: EndpointExpr) -> ApiExpr {
        let mut payload = ObjectSchema::new();
        payload.insert("id", AttributeSchema::primitive(Primitive::Int));
        payload.insert("body", AttributeSchema::string());
        payload.insert("name", AttributeSchema::string());
        payload.insert(
            "limit",
            AttributeSchema::primitive(Primitive::Int).with_default(serde_json::json!(10)),
        );
        payload.insert("token", AttributeSchema::string());
        ApiExpr::new("api")
            .with_type(UserType::new(
                "UpdatePayload",
                AttributeSchema::object(payload).require(["name"]),
            ))
            .with_service(ServiceExpr::new("svc").with_endpoint(endpoint))
    }

    #[test]
    fn test_need_init() {
        assert!(!need_init(&AttributeSchema::string()));
        assert!(!need_init(&AttributeSchema::array_of(AttributeSchema::string())));
        assert!(need_init(&AttributeSchema::user("Account")));
        assert!(need_init(&AttributeSchema::map_of(
            AttributeSchema::string(),
            AttributeSchema::user("Account")
        )));
        let mut obj = ObjectSchema::new();
        obj.insert("a", AttributeSchema::string());
        assert!(!need_init(&AttributeSchema::object(obj)));
    }

    #[test]
    fn test_payload_init_argument_order() {
        let endpoint = EndpointExpr::new("update")
            .with_payload(AttributeSchema::user("UpdatePayload"))
            .with_route(Verb::Put, "/{id}")
            .with_params(mapped(&["limit", "body"]))
            .with_headers(mapped(&["token"]));
        let api = api(endpoint);
        let ep = api.endpoint_ref("svc", "update").unwrap();
        let mut scope = ServiceScope::new(&api.types);
        let body = request_body(&mut scope, &ep).unwrap();
        let init = payload_init(&mut scope, &ep, body.as_ref()).unwrap().unwrap();

        assert_eq!(init.name, "NewUpdateUpdatePayload");
        let summary: Vec<(&str, &str, Location)> = init
            .args
            .iter()
            .map(|a| (a.name.as_str(), a.var_name.as_str(), a.location))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("body", "body", Location::Body),
                ("id", "id", Location::Path),
                ("body", "body1", Location::Query),
                ("limit", "limit", Location::Query),
                ("token", "token", Location::Header),
            ]
        );
        assert!(init.return_is_struct);
        assert!(init.body_transform.is_some());
    }

    #[test]
    fn test_optional_path_param_uses_address_of() {
        let endpoint = EndpointExpr::new("update")
            .with_payload(AttributeSchema::user("UpdatePayload"))
            .with_route(Verb::Put, "/{id}");
        let api = api(endpoint);
        let ep = api.endpoint_ref("svc", "update").unwrap();
        let mut scope = ServiceScope::new(&api.types);
        let init = payload_init(&mut scope, &ep, None).unwrap().unwrap();
        let id = init.args.iter().find(|a| a.name == "id").unwrap();
        assert!(id.policy.field_pointer);
        assert!(!id.policy.wire_pointer);
        assert_eq!(id.glue, Glue::AddressOf);
        assert_eq!(id.field_name.as_deref(), Some("ID"));
    }

    #[test]
    fn test_defaulted_query_param_is_value() {
        let endpoint = EndpointExpr::new("update")
            .with_payload(AttributeSchema::user("UpdatePayload"))
            .with_route(Verb::Put, "/")
            .with_params(mapped(&["limit"]));
        let api = api(endpoint);
        let ep = api.endpoint_ref("svc", "update").unwrap();
        let mut scope = ServiceScope::new(&api.types);
        let init = payload_init(&mut scope, &ep, None).unwrap().unwrap();
        let limit = &init.args[0];
        assert!(!limit.policy.field_pointer);
        assert_eq!(limit.default, Some(serde_json::json!(10)));
        assert_eq!(limit.glue, Glue::None);
    }

    #[test]
    fn test_primitive_payload_has_no_init() {
        let endpoint = EndpointExpr::new("get")
            .with_payload(AttributeSchema::primitive(Primitive::Int))
            .with_route(Verb::Get, "/{id}")
            .with_params(mapped(&["id"]));
        let api = api(endpoint);
        let ep = api.endpoint_ref("svc", "get").unwrap();
        let mut scope = ServiceScope::new(&api.types);
        assert!(payload_init(&mut scope, &ep, None).unwrap().is_none());
    }
}
