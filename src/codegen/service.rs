//! Service compilation
//!
//! Walks the endpoints of every selected service and assembles the data the
//! renderers consume: routes and path templates, payload partitions, body
//! types, constructors, response tables, error groups and validators.

use serde::Serialize;
use serde_json::Value as JsonValue;

use super::body::{BodyData, request_body};
use super::context::{BuildContext, ServiceScope};
use super::init::{InitData, payload_init};
use super::path::{PathTemplate, SliceEncoding, path_templates};
use super::policy::{Location, StoragePolicy, storage_policy};
use super::response::{ErrorGroupData, ResponseData, error_groups, response_table};
use super::transform::TransformHelper;
use super::validation::{CheckData, ValidateData, attribute_checks, validate_data};
use crate::core::config::CompilerConfig;
use crate::core::error::Result;
use crate::core::utils::{canonical_header_key, goify};
use crate::expr::view::view_names;
use crate::expr::{
    ApiExpr, AttributeSchema, EndpointRef, MappedAttribute, ServiceExpr, TypeLookup, UserType, Verb,
};

/// Path or query parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamData {
    pub name: String,
    pub wire_name: String,
    pub var_name: String,
    /// Payload field holding the parameter, `None` for non-object payloads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub type_name: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<JsonValue>,
    pub policy: StoragePolicy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slice: Option<SliceEncoding>,
    /// The parameter collects every query string value
    pub map_query_params: bool,
    pub checks: Vec<CheckData>,
}

/// Request or response header
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderData {
    pub name: String,
    pub wire_name: String,
    pub canonical_name: String,
    pub var_name: String,
    pub field_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub type_name: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<JsonValue>,
    pub policy: StoragePolicy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slice: Option<SliceEncoding>,
    pub checks: Vec<CheckData>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteData {
    pub verb: Verb,
    pub path: String,
    pub path_template: PathTemplate,
}

/// Request side of an endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayloadData {
    pub type_name: String,
    pub path_params: Vec<ParamData>,
    pub query_params: Vec<ParamData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_query_param: Option<ParamData>,
    pub headers: Vec<HeaderData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<BodyData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init: Option<InitData>,
}

/// Response side of an endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultData {
    pub type_name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub views: Vec<String>,
    pub responses: Vec<ResponseData>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointData {
    pub name: String,
    pub method_name: String,
    pub service_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub routes: Vec<RouteData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<PayloadData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultData>,
    pub errors: Vec<ErrorGroupData>,
}

/// Field of a synthesized type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldData {
    pub name: String,
    pub field_name: String,
    pub type_name: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<JsonValue>,
    pub pointer: bool,
}

/// Type synthesized for a service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeData {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub attribute: AttributeSchema,
    pub fields: Vec<FieldData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validate: Option<ValidateData>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub views: Vec<String>,
}

/// Everything generated for one service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceData {
    pub name: String,
    pub struct_name: String,
    pub var_name: String,
    pub endpoints: Vec<EndpointData>,
    pub types: Vec<TypeData>,
    pub helpers: Vec<TransformHelper>,
}

/// Compiles the services of `api` selected by `config`.
///
/// Each service gets its own [`ServiceScope`], so type names emitted for one
/// service never leak into another.
pub fn compile(api: &ApiExpr, config: &CompilerConfig) -> Result<Vec<ServiceData>> {
    config.validate()?;
    let ctx = BuildContext::new(api, config);
    let services = ctx
        .services()
        .map(|service| compile_service(&ctx, service))
        .collect::<Result<Vec<_>>>()?;
    tracing::info!("Compiled {} service(s) of {}", services.len(), api.name);
    Ok(services)
}

/// Compiles one service of the design.
pub fn compile_service<'a>(
    ctx: &BuildContext<'a>,
    service: &'a ServiceExpr,
) -> Result<ServiceData> {
    tracing::debug!("Compiling service {}", service.name);
    let mut scope = ServiceScope::new(&ctx.api.types);
    let mut endpoints = Vec::new();
    for ep in ctx.endpoints(service) {
        endpoints.push(compile_endpoint(&mut scope, &ep)?);
    }

    let types: Vec<TypeData> = scope.types().iter().map(|t| type_data(t, &scope)).collect();
    let helpers: Vec<TransformHelper> = scope.helpers().cloned().collect();
    tracing::debug!(
        "Service {} has {} endpoint(s), {} type(s) and {} helper(s)",
        service.name,
        endpoints.len(),
        types.len(),
        helpers.len()
    );
    Ok(ServiceData {
        name: service.name.clone(),
        struct_name: goify(&service.name, true),
        var_name: goify(&service.name, false),
        endpoints,
        types,
        helpers,
    })
}

fn compile_endpoint(scope: &mut ServiceScope<'_>, ep: &EndpointRef<'_>) -> Result<EndpointData> {
    tracing::trace!("Compiling endpoint {}", ep.qualified_name());
    let routes = ep
        .endpoint
        .routes
        .iter()
        .zip(path_templates(ep)?)
        .map(|(route, template)| RouteData {
            verb: route.verb,
            path: template.path.clone(),
            path_template: template,
        })
        .collect();

    let payload = match &ep.endpoint.payload {
        Some(payload) => Some(payload_data(scope, ep, payload)?),
        None => None,
    };
    let result = match &ep.endpoint.result {
        Some(result) => Some(ResultData {
            type_name: result.data_type.to_string(),
            views: view_names(result, &*scope),
            responses: response_table(scope, ep)?,
        }),
        None => None,
    };
    let errors = error_groups(scope, ep)?;

    Ok(EndpointData {
        name: ep.endpoint.name.clone(),
        method_name: goify(&ep.endpoint.name, true),
        service_name: ep.service.name.clone(),
        description: ep.endpoint.description.clone(),
        routes,
        payload,
        result,
        errors,
    })
}

fn payload_data(
    scope: &mut ServiceScope<'_>,
    ep: &EndpointRef<'_>,
    payload: &AttributeSchema,
) -> Result<PayloadData> {
    let object = payload.as_object(&*scope).is_some();
    let path_params = param_data(&ep.path_params(), Location::Path, object, &*scope);
    let query_params = param_data(&ep.query_params(), Location::Query, object, &*scope);
    let headers = header_data(&ep.headers(), &*scope);

    let map_query_param = ep.endpoint.map_query_params.as_ref().and_then(|name| {
        let att = payload.as_object(&*scope)?.get(name)?;
        let mut mapped = MappedAttribute::new();
        mapped.insert(name, att.clone(), payload.is_required(name, &*scope));
        let mut params = param_data(&mapped, Location::Query, object, &*scope);
        params.pop().map(|mut p| {
            p.map_query_params = true;
            p
        })
    });

    let body = request_body(scope, ep)?;
    let init = payload_init(scope, ep, body.as_ref())?;
    Ok(PayloadData {
        type_name: payload.data_type.to_string(),
        path_params,
        query_params,
        map_query_param,
        headers,
        body,
        init,
    })
}

/// Parameter data in wire name order
pub fn param_data(
    params: &MappedAttribute,
    location: Location,
    object_payload: bool,
    types: &dyn TypeLookup,
) -> Vec<ParamData> {
    params
        .sorted_by_wire()
        .into_iter()
        .map(|(name, wire, att)| {
            let required = params.is_required(name);
            ParamData {
                name: name.to_string(),
                wire_name: wire.to_string(),
                var_name: goify(name, false),
                field_name: object_payload.then(|| goify(name, true)),
                description: att.description.clone(),
                type_name: att.data_type.to_string(),
                required,
                default: att.default.clone(),
                policy: storage_policy(required, att.default.is_some(), location),
                slice: SliceEncoding::for_slice(att, types),
                map_query_params: false,
                checks: attribute_checks(att, wire, required, types),
            }
        })
        .collect()
}

/// Header data in wire name order
pub fn header_data(headers: &MappedAttribute, types: &dyn TypeLookup) -> Vec<HeaderData> {
    headers
        .sorted_by_wire()
        .into_iter()
        .map(|(name, wire, att)| {
            let required = headers.is_required(name);
            HeaderData {
                name: name.to_string(),
                wire_name: wire.to_string(),
                canonical_name: canonical_header_key(wire),
                var_name: goify(name, false),
                field_name: goify(name, true),
                description: att.description.clone(),
                type_name: att.data_type.to_string(),
                required,
                default: att.default.clone(),
                policy: storage_policy(required, att.default.is_some(), Location::Header),
                slice: SliceEncoding::for_slice(att, types),
                checks: attribute_checks(att, wire, required, types),
            }
        })
        .collect()
}

fn type_data(user_type: &UserType, types: &dyn TypeLookup) -> TypeData {
    let attribute = &user_type.attribute;
    let fields = attribute
        .as_object(types)
        .map(|obj| {
            obj.iter()
                .map(|(name, field)| {
                    let required = attribute.is_required(name, types);
                    FieldData {
                        name: name.to_string(),
                        field_name: goify(name, true),
                        type_name: field.data_type.to_string(),
                        required,
                        default: field.default.clone(),
                        pointer: storage_policy(required, field.default.is_some(), Location::Body)
                            .field_pointer,
                    }
                })
                .collect()
        })
        .unwrap_or_default();
    TypeData {
        name: user_type.name.clone(),
        description: attribute.description.clone(),
        attribute: attribute.clone(),
        fields,
        validate: validate_data(
            &user_type.name,
            &AttributeSchema::user(user_type.name.as_str()),
            types,
        ),
        views: user_type.views.iter().map(|v| v.name.clone()).collect(),
    }
}
