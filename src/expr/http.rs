//! HTTP transport design: APIs, services, endpoints, routes and responses
//!
//! The types in this module are the finalized input of the compiler. They are
//! deserialized from a design document (see [`crate::design`]) and then run
//! through [`ApiExpr::finalize`] once; everything downstream only reads them.
//!
//! [`EndpointRef`] is the partition resolver: it knows which attributes of an
//! endpoint payload travel in the path, the query string or the headers.

use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::mapped::MappedAttribute;
use super::schema::{AttributeSchema, TypeLookup, UserType};
use crate::core::utils::goify;

/// Matches `{name}` and `{*name}` wildcards in a path pattern.
pub static WILDCARD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/\{\*?([a-zA-Z0-9_]+)\}").expect("wildcard pattern is a valid regex")
});

/// Returns the wildcard names of `path` in left-to-right order.
pub fn extract_route_wildcards(path: &str) -> Vec<String> {
    WILDCARD_RE
        .captures_iter(path)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// HTTP method of a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    Trace,
    Connect,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Head => "HEAD",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
            Verb::Options => "OPTIONS",
            Verb::Trace => "TRACE",
            Verb::Connect => "CONNECT",
        }
    }

    pub fn method(&self) -> http::Method {
        match self {
            Verb::Get => http::Method::GET,
            Verb::Head => http::Method::HEAD,
            Verb::Post => http::Method::POST,
            Verb::Put => http::Method::PUT,
            Verb::Patch => http::Method::PATCH,
            Verb::Delete => http::Method::DELETE,
            Verb::Options => http::Method::OPTIONS,
            Verb::Trace => http::Method::TRACE,
            Verb::Connect => http::Method::CONNECT,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A verb and path pattern serving an endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteExpr {
    pub verb: Verb,
    pub path: String,
}

impl RouteExpr {
    pub fn new(verb: Verb, path: impl Into<String>) -> Self {
        Self {
            verb,
            path: path.into(),
        }
    }

    /// Absolute routes start with `//` and ignore the API and service paths.
    pub fn is_absolute(&self) -> bool {
        self.path.starts_with("//")
    }

    /// The path the route is served under once prefixed by the API path and
    /// the service base path.
    pub fn full_path(&self, api_path: &str, base_path: &str) -> String {
        if self.is_absolute() {
            return self.path[1..].to_string();
        }
        join_paths(&[api_path, base_path, &self.path])
    }
}

fn join_paths(parts: &[&str]) -> String {
    let mut joined = String::new();
    for part in parts {
        let trimmed = part.trim_matches('/');
        if trimmed.is_empty() {
            continue;
        }
        joined.push('/');
        joined.push_str(trimmed);
    }
    if joined.is_empty() {
        return "/".to_string();
    }
    if parts.last().is_some_and(|p| p.len() > 1 && p.ends_with('/')) {
        joined.push('/');
    }
    joined
}

/// Response selector: the response applies when attribute `attribute` of the
/// result holds `value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub attribute: String,
    pub value: String,
}

/// Explicit body declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyDecl {
    /// The body has the given shape
    Schema(AttributeSchema),
    /// The body is a single attribute of the payload or result
    Attribute(String),
}

/// One possible HTTP response of an endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseExpr {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<Tag>,
    #[serde(default)]
    pub headers: MappedAttribute,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<BodyDecl>,
    /// View used to render the result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
}

impl ResponseExpr {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            description: None,
            tag: None,
            headers: MappedAttribute::new(),
            body: None,
            view: None,
        }
    }

    pub fn with_tag(mut self, attribute: impl Into<String>, value: impl Into<String>) -> Self {
        self.tag = Some(Tag {
            attribute: attribute.into(),
            value: value.into(),
        });
        self
    }

    pub fn with_headers(mut self, headers: MappedAttribute) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: BodyDecl) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_view(mut self, view: impl Into<String>) -> Self {
        self.view = Some(view.into());
        self
    }

    /// Identifier form of the status reason phrase (`404` is `NotFound`).
    pub fn status_text(&self) -> String {
        http::StatusCode::from_u16(self.status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .map(|reason| goify(reason, true))
            .unwrap_or_else(|| format!("Status{}", self.status))
    }
}

/// A named error an endpoint may return and how it is written to the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorExpr {
    pub name: String,
    pub schema: AttributeSchema,
    pub response: ResponseExpr,
}

impl ErrorExpr {
    pub fn new(name: impl Into<String>, schema: AttributeSchema, response: ResponseExpr) -> Self {
        Self {
            name: name.into(),
            schema,
            response,
        }
    }
}

/// A service method exposed over HTTP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointExpr {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<AttributeSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AttributeSchema>,
    #[serde(default)]
    pub errors: Vec<ErrorExpr>,
    pub routes: Vec<RouteExpr>,
    /// Path and query parameters declared on the endpoint
    #[serde(default)]
    pub params: MappedAttribute,
    #[serde(default)]
    pub headers: MappedAttribute,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<BodyDecl>,
    #[serde(default)]
    pub responses: Vec<ResponseExpr>,
    /// Payload attribute of map type receiving every query parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_query_params: Option<String>,
}

impl EndpointExpr {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            payload: None,
            result: None,
            errors: Vec::new(),
            routes: Vec::new(),
            params: MappedAttribute::new(),
            headers: MappedAttribute::new(),
            body: None,
            responses: Vec::new(),
            map_query_params: None,
        }
    }

    pub fn with_payload(mut self, payload: AttributeSchema) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_result(mut self, result: AttributeSchema) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_route(mut self, verb: Verb, path: impl Into<String>) -> Self {
        self.routes.push(RouteExpr::new(verb, path));
        self
    }

    pub fn with_params(mut self, params: MappedAttribute) -> Self {
        self.params = params;
        self
    }

    pub fn with_headers(mut self, headers: MappedAttribute) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: BodyDecl) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_response(mut self, response: ResponseExpr) -> Self {
        self.responses.push(response);
        self
    }

    pub fn with_error(mut self, error: ErrorExpr) -> Self {
        self.errors.push(error);
        self
    }
}

/// A group of endpoints sharing a base path, params, headers and errors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceExpr {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub base_path: String,
    #[serde(default)]
    pub params: MappedAttribute,
    #[serde(default)]
    pub headers: MappedAttribute,
    #[serde(default)]
    pub endpoints: Vec<EndpointExpr>,
    #[serde(default)]
    pub errors: Vec<ErrorExpr>,
}

impl ServiceExpr {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            base_path: String::new(),
            params: MappedAttribute::new(),
            headers: MappedAttribute::new(),
            endpoints: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: EndpointExpr) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    pub fn endpoint(&self, name: &str) -> Option<&EndpointExpr> {
        self.endpoints.iter().find(|e| e.name == name)
    }
}

/// Root of a design
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiExpr {
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub params: MappedAttribute,
    #[serde(default)]
    pub headers: MappedAttribute,
    #[serde(default)]
    pub services: Vec<ServiceExpr>,
    #[serde(default)]
    pub errors: Vec<ErrorExpr>,
    /// Named types referenced by [`DataType::User`](super::DataType::User)
    #[serde(default)]
    pub types: IndexMap<String, UserType>,
}

impl ApiExpr {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, user_type: UserType) -> Self {
        self.types.insert(user_type.name.clone(), user_type);
        self
    }

    pub fn with_service(mut self, service: ServiceExpr) -> Self {
        self.services.push(service);
        self
    }

    pub fn service(&self, name: &str) -> Option<&ServiceExpr> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Resolver view of the endpoint `endpoint` of service `service`
    pub fn endpoint_ref(&self, service: &str, endpoint: &str) -> Option<EndpointRef<'_>> {
        let service = self.service(service)?;
        let endpoint = service.endpoint(endpoint)?;
        Some(EndpointRef::new(self, service, endpoint))
    }

    /// Every endpoint of every service, in declaration order
    pub fn endpoints(&self) -> impl Iterator<Item = EndpointRef<'_>> {
        self.services.iter().flat_map(move |service| {
            service
                .endpoints
                .iter()
                .map(move |endpoint| EndpointRef::new(self, service, endpoint))
        })
    }
}

/// An endpoint together with its enclosing service and API.
///
/// Computes the partitions of the payload: which attributes are path
/// parameters, query parameters and headers. The body is what remains and is
/// computed by [`crate::codegen::body`].
#[derive(Debug, Clone, Copy)]
pub struct EndpointRef<'a> {
    pub api: &'a ApiExpr,
    pub service: &'a ServiceExpr,
    pub endpoint: &'a EndpointExpr,
}

impl<'a> EndpointRef<'a> {
    pub fn new(api: &'a ApiExpr, service: &'a ServiceExpr, endpoint: &'a EndpointExpr) -> Self {
        Self {
            api,
            service,
            endpoint,
        }
    }

    pub fn types(&self) -> &'a IndexMap<String, UserType> {
        &self.api.types
    }

    /// `service.endpoint`, used to qualify diagnostics
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.service.name, self.endpoint.name)
    }

    /// Whether every route opts out of API and service inheritance
    pub fn all_routes_absolute(&self) -> bool {
        !self.endpoint.routes.is_empty() && self.endpoint.routes.iter().all(RouteExpr::is_absolute)
    }

    /// Full path of each route, in declaration order
    pub fn full_paths(&self) -> Vec<String> {
        self.endpoint
            .routes
            .iter()
            .map(|r| r.full_path(&self.api.path, &self.service.base_path))
            .collect()
    }

    /// Union of the wildcards of every route
    pub fn wildcards(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.full_paths()
            .iter()
            .flat_map(|p| extract_route_wildcards(p))
            .filter(|w| seen.insert(w.clone()))
            .collect()
    }

    /// Path and query parameters: the endpoint declarations merged over the
    /// service and API ones, completed by payload attributes named by a
    /// wildcard. Inheritance is skipped when every route is absolute.
    pub fn all_params(&self) -> MappedAttribute {
        let mut params = if self.all_routes_absolute() {
            self.endpoint.params.clone()
        } else {
            let mut params = self.api.params.clone();
            params.merge(&self.service.params);
            params.merge(&self.endpoint.params);
            params
        };

        if let Some(payload) = &self.endpoint.payload {
            if let Some(object) = payload.as_object(self.types()) {
                for wildcard in self.wildcards() {
                    if params.contains(&wildcard) {
                        continue;
                    }
                    if let Some(att) = object.get(&wildcard) {
                        let required = payload.is_required(&wildcard, self.types());
                        params.insert(&wildcard, att.clone(), required);
                    }
                }
            }
        }

        self.with_payload_attributes(params)
    }

    /// Parameters named by at least one route wildcard
    pub fn path_params(&self) -> MappedAttribute {
        let wildcards = self.wildcards();
        let mut params = self.all_params();
        let query: Vec<String> = params
            .names()
            .filter(|name| !wildcards.iter().any(|w| w == name))
            .map(str::to_string)
            .collect();
        for name in query {
            params.delete(&name);
        }
        params
    }

    /// Parameters that are not path parameters
    pub fn query_params(&self) -> MappedAttribute {
        let mut params = self.all_params();
        params.remove_all(&self.path_params());
        params
    }

    /// Request headers merged like the params, regardless of absolute routes
    pub fn headers(&self) -> MappedAttribute {
        let mut headers = self.api.headers.clone();
        headers.merge(&self.service.headers);
        headers.merge(&self.endpoint.headers);
        self.with_payload_attributes(headers)
    }

    /// Endpoint errors completed with the service then API errors not
    /// overridden by name.
    pub fn errors(&self) -> Vec<&'a ErrorExpr> {
        let mut errors: Vec<&'a ErrorExpr> = self.endpoint.errors.iter().collect();
        for inherited in self.service.errors.iter().chain(self.api.errors.iter()) {
            if !errors.iter().any(|e| e.name == inherited.name) {
                errors.push(inherited);
            }
        }
        errors
    }

    /// Payload attributes are authoritative for the params and headers that
    /// name them. A non-object payload is the single param or header.
    fn with_payload_attributes(&self, mut mapped: MappedAttribute) -> MappedAttribute {
        let Some(payload) = &self.endpoint.payload else {
            return mapped;
        };
        let types = self.types();
        match payload.as_object(types) {
            Some(object) => {
                let names: Vec<String> = mapped.names().map(str::to_string).collect();
                for name in names {
                    if let Some(att) = object.get(&name) {
                        let required = payload.is_required(&name, types);
                        mapped.insert(&name, att.clone(), required);
                    }
                }
            }
            None if mapped.len() == 1 => {
                let name = mapped.names().next().map(str::to_string);
                if let Some(name) = name {
                    let mut att = payload.clone();
                    if let Ok(resolved) = payload.resolve(types) {
                        att = resolved.clone();
                    }
                    mapped.insert(&name, att, true);
                }
            }
            None => {}
        }
        mapped
    }
}

impl TypeLookup for ApiExpr {
    fn lookup(&self, name: &str) -> Option<&UserType> {
        self.types.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::schema::{ObjectSchema, Primitive, Validation};

    fn mapped(entries: &[(&str, AttributeSchema)], required: &[&str]) -> MappedAttribute {
        let mut obj = ObjectSchema::new();
        for (name, att) in entries {
            obj.insert(*name, att.clone());
        }
        MappedAttribute::from_object(
            obj,
            Validation {
                required: required.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            },
        )
    }

    fn payload() -> AttributeSchema {
        let mut obj = ObjectSchema::new();
        obj.insert("org", AttributeSchema::primitive(Primitive::UInt));
        obj.insert("id", AttributeSchema::primitive(Primitive::Int32));
        obj.insert("filter", AttributeSchema::string());
        obj.insert("token", AttributeSchema::string());
        obj.insert("name", AttributeSchema::string());
        AttributeSchema::object(obj).require(["id", "name"])
    }

    fn api() -> ApiExpr {
        let mut service = ServiceExpr::new("account").with_base_path("/orgs/{org}");
        service.params = mapped(&[("org", AttributeSchema::string())], &[]);
        let endpoint = EndpointExpr::new("show")
            .with_payload(payload())
            .with_route(Verb::Get, "/accounts/{id}")
            .with_params(mapped(&[("filter", AttributeSchema::string())], &[]))
            .with_headers(mapped(
                &[("token:Authorization", AttributeSchema::string())],
                &[],
            ));
        let mut api = ApiExpr::new("bank").with_service(service.with_endpoint(endpoint));
        api.path = "/api".to_string();
        api
    }

    #[test]
    fn test_extract_route_wildcards() {
        assert_eq!(
            extract_route_wildcards("/account/test/{id}/view/{view}"),
            vec!["id", "view"]
        );
        assert_eq!(extract_route_wildcards("/files/{*path}"), vec!["path"]);
        assert!(extract_route_wildcards("/plain/path").is_empty());
    }

    #[test]
    fn test_full_path() {
        let route = RouteExpr::new(Verb::Get, "/accounts/{id}");
        assert_eq!(route.full_path("/api", "/orgs/{org}"), "/api/orgs/{org}/accounts/{id}");
        assert_eq!(route.full_path("", ""), "/accounts/{id}");

        let absolute = RouteExpr::new(Verb::Get, "//health");
        assert!(absolute.is_absolute());
        assert_eq!(absolute.full_path("/api", "/orgs"), "/health");

        let root = RouteExpr::new(Verb::Get, "/");
        assert_eq!(root.full_path("", ""), "/");
        let trailing = RouteExpr::new(Verb::Post, "/items/");
        assert_eq!(trailing.full_path("/api", ""), "/api/items/");
    }

    #[test]
    fn test_partitions() {
        let api = api();
        let ep = api.endpoint_ref("account", "show").unwrap();

        let path: Vec<String> = ep.path_params().names().map(str::to_string).collect();
        assert_eq!(path, vec!["org", "id"]);

        let query: Vec<String> = ep.query_params().names().map(str::to_string).collect();
        assert_eq!(query, vec!["filter"]);

        let headers = ep.headers();
        assert_eq!(headers.elem_name("token").unwrap(), "Authorization");
    }

    #[test]
    fn test_payload_is_source_of_truth() {
        let api = api();
        let ep = api.endpoint_ref("account", "show").unwrap();
        let params = ep.all_params();
        // declared as string on the service, the payload says uint
        assert_eq!(
            params.get("org").unwrap().data_type,
            crate::expr::schema::DataType::Primitive(Primitive::UInt)
        );
        assert!(params.is_required("id"));
        assert!(!params.is_required("filter"));
    }

    #[test]
    fn test_absolute_routes_skip_inheritance() {
        let mut api = api();
        api.services[0].endpoints[0].routes = vec![RouteExpr::new(Verb::Get, "//accounts/{id}")];
        let ep = api.endpoint_ref("account", "show").unwrap();
        let names: Vec<String> = ep.all_params().names().map(str::to_string).collect();
        assert_eq!(names, vec!["filter", "id"]);
        // headers are inherited regardless
        assert!(ep.headers().contains("token"));
    }

    #[test]
    fn test_non_object_payload_is_single_param() {
        let endpoint = EndpointExpr::new("get")
            .with_payload(AttributeSchema::primitive(Primitive::Int64))
            .with_route(Verb::Get, "/{id}")
            .with_params(mapped(&[("id", AttributeSchema::string())], &[]));
        let api = ApiExpr::new("api").with_service(ServiceExpr::new("svc").with_endpoint(endpoint));
        let ep = api.endpoint_ref("svc", "get").unwrap();
        let params = ep.path_params();
        assert_eq!(
            params.get("id").unwrap().data_type,
            crate::expr::schema::DataType::Primitive(Primitive::Int64)
        );
        assert!(params.is_required("id"));
    }

    #[test]
    fn test_errors_are_inherited_by_name() {
        let not_found =
            ErrorExpr::new("not_found", AttributeSchema::string(), ResponseExpr::new(404));
        let mut api = api();
        api.errors.push(not_found.clone());
        api.errors.push(ErrorExpr::new(
            "unauthorized",
            AttributeSchema::string(),
            ResponseExpr::new(401),
        ));
        api.services[0].endpoints[0].errors.push(ErrorExpr::new(
            "not_found",
            AttributeSchema::string(),
            ResponseExpr::new(410),
        ));
        let ep = api.endpoint_ref("account", "show").unwrap();
        let errors = ep.errors();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].response.status, 410);
        assert_eq!(errors[1].name, "unauthorized");
    }

    #[test]
    fn test_status_text() {
        assert_eq!(ResponseExpr::new(404).status_text(), "NotFound");
        assert_eq!(ResponseExpr::new(200).status_text(), "OK");
        assert_eq!(ResponseExpr::new(599).status_text(), "Status599");
    }
}
