//! Response dispatch tables and error groups

use std::collections::BTreeMap;

use serde::Serialize;

use super::body::{BodyData, error_body, response_body};
use super::context::ServiceScope;
use super::init::{InitData, error_init, result_init, with_value_attributes};
use super::service::{HeaderData, header_data};
use crate::core::error::Result;
use crate::core::utils::goify;
use crate::expr::{EndpointRef, ErrorExpr, ResponseExpr};

/// Tag selecting a response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagData {
    pub attribute: String,
    pub field_name: String,
    pub value: String,
}

/// One entry of a response table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseData {
    pub status_code: u16,
    pub status_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<TagData>,
    pub headers: Vec<HeaderData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<BodyData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    /// Constructor of the value from the decoded response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init: Option<InitData>,
}

/// An error and its response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorData {
    pub name: String,
    pub type_name: String,
    pub response: ResponseData,
}

/// Errors sharing a status code
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorGroupData {
    pub status_code: u16,
    pub status_text: String,
    pub errors: Vec<ErrorData>,
}

/// Response table of `ep`: tagged responses first, the untagged default
/// last.
pub fn response_table(
    scope: &mut ServiceScope<'_>,
    ep: &EndpointRef<'_>,
) -> Result<Vec<ResponseData>> {
    let mut responses: Vec<&ResponseExpr> = ep.endpoint.responses.iter().collect();
    responses.sort_by_key(|r| r.tag.is_none());

    let mut table = Vec::with_capacity(responses.len());
    for response in responses {
        let body = response_body(scope, ep, response)?;
        let init = result_init(scope, ep, response, body.as_ref())?;
        let headers = match &ep.endpoint.result {
            Some(result) => with_value_attributes(&response.headers, result, scope),
            None => response.headers.clone(),
        };
        table.push(ResponseData {
            status_code: response.status,
            status_text: response.status_text(),
            description: response.description.clone(),
            tag: response.tag.as_ref().map(|tag| TagData {
                attribute: tag.attribute.clone(),
                field_name: goify(&tag.attribute, true),
                value: tag.value.clone(),
            }),
            headers: header_data(&headers, &*scope),
            body,
            view: response.view.clone(),
            init,
        });
    }
    Ok(table)
}

/// Errors of `ep`, inherited ones included, grouped by ascending status code.
pub fn error_groups(
    scope: &mut ServiceScope<'_>,
    ep: &EndpointRef<'_>,
) -> Result<Vec<ErrorGroupData>> {
    let mut groups: BTreeMap<u16, Vec<ErrorData>> = BTreeMap::new();
    for error in ep.errors() {
        let data = error_data(scope, ep, error)?;
        groups.entry(error.response.status).or_default().push(data);
    }
    Ok(groups
        .into_iter()
        .map(|(status_code, errors)| ErrorGroupData {
            status_code,
            status_text: errors
                .first()
                .map(|e| e.response.status_text.clone())
                .unwrap_or_default(),
            errors,
        })
        .collect())
}

fn error_data(
    scope: &mut ServiceScope<'_>,
    ep: &EndpointRef<'_>,
    error: &ErrorExpr,
) -> Result<ErrorData> {
    let body = error_body(scope, ep, error)?;
    let init = error_init(scope, ep, error, body.as_ref())?;
    let headers = with_value_attributes(&error.response.headers, &error.schema, scope);
    let response = &error.response;
    Ok(ErrorData {
        name: error.name.clone(),
        type_name: error.schema.data_type.to_string(),
        response: ResponseData {
            status_code: response.status,
            status_text: response.status_text(),
            description: response.description.clone(),
            tag: None,
            headers: header_data(&headers, &*scope),
            body,
            view: None,
            init,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{
        ApiExpr, AttributeSchema, EndpointExpr, MappedAttribute, ObjectSchema, Primitive,
        ServiceExpr, UserType, Validation, Verb,
    };

    fn result_type() -> UserType {
        let mut obj = ObjectSchema::new();
        obj.insert("kind", AttributeSchema::string());
        obj.insert("id", AttributeSchema::primitive(Primitive::Int));
        obj.insert("location", AttributeSchema::string());
        UserType::new("Created", AttributeSchema::object(obj).require(["kind"]))
    }

    fn location_header() -> MappedAttribute {
        let mut obj = ObjectSchema::new();
        obj.insert("location:Location", AttributeSchema::string());
        MappedAttribute::from_object(obj, Validation::default())
    }

    #[test]
    fn test_response_table_puts_default_last() {
        let endpoint = EndpointExpr::new("create")
            .with_result(AttributeSchema::user("Created"))
            .with_route(Verb::Post, "/")
            .with_response(ResponseExpr::new(201).with_headers(location_header()))
            .with_response(ResponseExpr::new(202).with_tag("kind", "async"));
        let api = ApiExpr::new("api")
            .with_type(result_type())
            .with_service(ServiceExpr::new("svc").with_endpoint(endpoint));
        let ep = api.endpoint_ref("svc", "create").unwrap();
        let mut scope = ServiceScope::new(&api.types);

        let table = response_table(&mut scope, &ep).unwrap();
        let statuses: Vec<u16> = table.iter().map(|r| r.status_code).collect();
        assert_eq!(statuses, vec![202, 201]);
        assert_eq!(table[0].tag.as_ref().unwrap().field_name, "Kind");

        let created = &table[1];
        assert_eq!(created.status_text, "Created");
        assert_eq!(created.headers[0].wire_name, "Location");
        let body = created.body.as_ref().unwrap();
        assert_eq!(body.type_name.as_deref(), Some("CreateCreatedResponseBody"));
        let init = created.init.as_ref().unwrap();
        assert_eq!(init.name, "NewCreateCreatedCreated");
        assert_eq!(init.args.len(), 2);
    }

    #[test]
    fn test_error_groups_sorted_by_status() {
        let endpoint = EndpointExpr::new("show")
            .with_route(Verb::Get, "/")
            .with_error(ErrorExpr::new(
                "not_found",
                AttributeSchema::string(),
                ResponseExpr::new(404),
            ))
            .with_error(ErrorExpr::new(
                "bad_request",
                AttributeSchema::string(),
                ResponseExpr::new(400),
            ));
        let mut service = ServiceExpr::new("svc").with_endpoint(endpoint);
        service.errors.push(ErrorExpr::new(
            "gone",
            AttributeSchema::string(),
            ResponseExpr::new(404),
        ));
        let api = ApiExpr::new("api").with_service(service);
        let ep = api.endpoint_ref("svc", "show").unwrap();
        let mut scope = ServiceScope::new(&api.types);

        let groups = error_groups(&mut scope, &ep).unwrap();
        let summary: Vec<(u16, Vec<&str>)> = groups
            .iter()
            .map(|g| (g.status_code, g.errors.iter().map(|e| e.name.as_str()).collect()))
            .collect();
        assert_eq!(
            summary,
            vec![(400, vec!["bad_request"]), (404, vec!["not_found", "gone"])]
        );
        assert_eq!(groups[1].status_text, "NotFound");
        // string errors travel as the body itself
        let body = groups[0].errors[0].response.body.as_ref().unwrap();
        assert!(body.type_name.is_none());
        assert!(groups[0].errors[0].response.init.is_none());
    }
}
